use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth application identity.
///
/// The client id is what makes a credential usable at all; the secret is
/// additionally required for token-endpoint calls (code exchange, refresh).
#[derive(Clone, PartialEq, Eq)]
pub struct ClientKeys {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (absent for public clients)
    pub client_secret: Option<String>,
}

impl ClientKeys {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
        }
    }
}

// Custom Debug implementation to avoid logging the client secret
impl fmt::Debug for ClientKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientKeys")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// A bearer access token together with its absolute expiry instant.
///
/// The two always travel together: there is no way to hold a token without
/// knowing when it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The opaque bearer value
    pub token: String,
    /// Absolute instant after which the token is invalid (UTC)
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Build from the provider's relative "seconds remaining" value.
    pub fn from_expires_in(token: impl Into<String>, expires_in: i64, now: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: now + Duration::seconds(expires_in),
        }
    }

    /// Signed time remaining until expiry; negative once expired.
    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Whether the token is past its expiry at the given instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.time_left(now) <= Duration::zero()
    }
}

// Custom Debug implementation to avoid logging the token value
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The credential state machine.
///
/// Each variant carries exactly the fields valid for that state, so the
/// partial combinations the wire protocol could otherwise produce (an access
/// token without an expiry, tokens without a client id) are unrepresentable.
///
/// # State Transitions
///
/// ```text
/// Unconfigured ──keys──> Configured ──exchange/refresh──> Authenticated
///                            ^                                 │
///                            └──────── clear tokens ───────────┤
///                                                              │ (expiry is
/// Renewable <── restore of a record without an access token ───┘  lazily
///     │                                                           computed,
///     └─────────────── successful refresh ──> Authenticated       not a
///                                                                 variant)
/// ```
///
/// "Expired" is not a stored state: an `Authenticated` credential whose
/// `expires_at` has passed is detected lazily against the injected clock.
/// `Renewable` covers the other expired shape: no access token at all, but a
/// refresh token still available for silent renewal.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// No client id known; nothing can be done until one is configured.
    Unconfigured,
    /// Application identity known, no tokens yet.
    Configured { keys: ClientKeys },
    /// Holding a bearer token (possibly past expiry) and optionally a
    /// refresh token.
    Authenticated {
        keys: ClientKeys,
        access: AccessToken,
        refresh: Option<String>,
    },
    /// No usable access token, but silent renewal is possible.
    Renewable { keys: ClientKeys, refresh: String },
}

impl Credential {
    /// Build the initial credential from statically-configured keys.
    pub fn from_keys(client_id: Option<String>, client_secret: Option<String>) -> Self {
        match client_id {
            Some(client_id) => Credential::Configured {
                keys: ClientKeys {
                    client_id,
                    client_secret,
                },
            },
            None => Credential::Unconfigured,
        }
    }

    pub fn keys(&self) -> Option<&ClientKeys> {
        match self {
            Credential::Unconfigured => None,
            Credential::Configured { keys }
            | Credential::Authenticated { keys, .. }
            | Credential::Renewable { keys, .. } => Some(keys),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.keys().map(|k| k.client_id.as_str())
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.keys().and_then(|k| k.client_secret.as_deref())
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        match self {
            Credential::Authenticated { access, .. } => Some(access),
            _ => None,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        match self {
            Credential::Authenticated { refresh, .. } => refresh.as_deref(),
            Credential::Renewable { refresh, .. } => Some(refresh),
            _ => None,
        }
    }

    /// Apply a successful token grant.
    ///
    /// A grant without a refresh token never discards one already held:
    /// authorization servers routinely omit `refresh_token` from refresh
    /// responses and the stored one stays valid.
    ///
    /// An `Unconfigured` credential is returned unchanged: a grant has no
    /// keys to attach to, and callers validate configuration before any
    /// exchange.
    pub fn apply_grant(self, access: AccessToken, new_refresh: Option<String>) -> Self {
        match self {
            Credential::Unconfigured => Credential::Unconfigured,
            Credential::Configured { keys } => Credential::Authenticated {
                keys,
                access,
                refresh: new_refresh,
            },
            Credential::Authenticated { keys, refresh, .. } => Credential::Authenticated {
                keys,
                access,
                refresh: new_refresh.or(refresh),
            },
            Credential::Renewable { keys, refresh } => Credential::Authenticated {
                keys,
                access,
                refresh: new_refresh.or(Some(refresh)),
            },
        }
    }

    /// Drop access token, refresh token, and expiry together (sign-out).
    /// Client keys are untouched.
    pub fn without_tokens(self) -> Self {
        match self {
            Credential::Unconfigured => Credential::Unconfigured,
            Credential::Configured { keys }
            | Credential::Authenticated { keys, .. }
            | Credential::Renewable { keys, .. } => Credential::Configured { keys },
        }
    }

    /// Convert to the persisted record form.
    pub fn to_record(&self) -> StoredCredential {
        let keys = self.keys();
        StoredCredential {
            client_id: keys.map(|k| k.client_id.clone()),
            client_secret: keys.and_then(|k| k.client_secret.clone()),
            access_token: self.access_token().map(|a| a.token.clone()),
            refresh_token: self.refresh_token().map(|s| s.to_string()),
            expires_at: self.access_token().map(|a| a.expires_at),
        }
    }

    /// Reconstruct from a persisted record.
    ///
    /// Partial shapes degrade instead of erroring: an access token without an
    /// expiry (or vice versa) is dropped, and tokens without a client id are
    /// unusable and dropped with it.
    pub fn from_record(record: StoredCredential) -> Self {
        let keys = match record.client_id {
            Some(client_id) => ClientKeys {
                client_id,
                client_secret: record.client_secret,
            },
            None => return Credential::Unconfigured,
        };

        match (record.access_token, record.expires_at) {
            (Some(token), Some(expires_at)) => Credential::Authenticated {
                keys,
                access: AccessToken { token, expires_at },
                refresh: record.refresh_token,
            },
            _ => match record.refresh_token {
                Some(refresh) => Credential::Renewable { keys, refresh },
                None => Credential::Configured { keys },
            },
        }
    }
}

// Custom Debug implementation to avoid logging refresh tokens
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Unconfigured => f.write_str("Unconfigured"),
            Credential::Configured { keys } => {
                f.debug_struct("Configured").field("keys", keys).finish()
            }
            Credential::Authenticated { keys, access, refresh } => f
                .debug_struct("Authenticated")
                .field("keys", keys)
                .field("access", access)
                .field("refresh", &refresh.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            Credential::Renewable { keys, .. } => f
                .debug_struct("Renewable")
                .field("keys", keys)
                .field("refresh", &"[REDACTED]")
                .finish(),
        }
    }
}

/// The persisted credential record.
///
/// One JSON object per storage namespace, every field nullable, `expires_at`
/// serialized as an ISO-8601 timestamp string. The record is the sole source
/// of truth across process restarts.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

// Custom Debug implementation to avoid logging secrets from the record
impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of an expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryStatus {
    /// Whether the access token is unusable (past expiry or absent)
    pub expired: bool,
    /// Signed time remaining; zero or negative when expired
    pub time_left: Duration,
    /// Whole minutes remaining (convenience for UI display)
    pub minutes_left: i64,
}

/// Read-only snapshot of the credential state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthStatus {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    /// Token present and, where expiry is known, not yet expired
    pub is_authenticated: bool,
    /// Refresh token and client secret both present
    pub can_auto_refresh: bool,
    pub expiry: Option<ExpiryStatus>,
}
