//! # Token Lifecycle Manager
//!
//! Owns the bearer-credential lifecycle for the content automation core:
//! acquiring tokens through the authorization-code flow, persisting them,
//! proactively refreshing them before expiry, and wrapping API calls with
//! transparent recovery from credential expiry.
//!
//! ## Overview
//!
//! The manager is the only stateful piece of the auth stack. It composes:
//! - a [`TokenStore`] for durable persistence (best-effort, never a hard
//!   dependency within a session)
//! - a [`TokenClient`] for the wire protocol
//! - host capabilities ([`HttpClient`], [`Navigator`], [`Clock`]) injected at
//!   construction
//! - the [`EventBus`] for lifecycle notifications
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{AuthConfig, TokenLifecycleManager};
//! use core_runtime::events::EventBus;
//!
//! let manager = TokenLifecycleManager::new(
//!     AuthConfig {
//!         client_id: Some("client-id".to_string()),
//!         client_secret: Some("client-secret".to_string()),
//!         scope: "https://www.googleapis.com/auth/documents".to_string(),
//!         ..AuthConfig::default()
//!     },
//!     http_client,
//!     key_value_store,
//!     navigator,
//!     clock,
//!     EventBus::default(),
//! )
//! .await;
//!
//! // On every page load:
//! if manager.complete_authorization(None).await? {
//!     // Just returned from the consent screen
//! }
//!
//! // Instead of calling the transport directly:
//! let response = manager.authenticated_request(request).await?;
//! ```
//!
//! ## Concurrency
//!
//! A background monitor task and foreground callers share one refresh path.
//! Refreshes are single-flight: concurrent attempts serialize on a lock, and
//! a caller that waited behind a completed refresh reuses the fresh token
//! instead of issuing a duplicate request.

use crate::error::{AuthError, Result};
use crate::oauth::{AuthEndpoints, TokenClient};
use crate::store::TokenStore;
use crate::types::{AccessToken, AuthStatus, Credential, ExpiryStatus};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::navigation::Navigator;
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::Clock;
use chrono::Duration as TimeDelta;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Default interval between expiry checks (1 minute)
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Remaining lifetime below which a background refresh is scheduled (5 minutes)
const REFRESH_WINDOW_SECS: i64 = 300;

/// Static configuration for the token lifecycle manager.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID; required before any authorization operation
    pub client_id: Option<String>,
    /// OAuth client secret; required for token-endpoint calls
    pub client_secret: Option<String>,
    /// Space-separated OAuth scopes to request
    pub scope: String,
    /// Authorization server endpoints
    pub endpoints: AuthEndpoints,
    /// Key under which the credential record is persisted
    pub storage_namespace: String,
    /// Redirect URI override; derived from the current location when absent
    pub redirect_uri: Option<String>,
    /// Interval between background expiry checks
    pub monitor_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            scope: String::new(),
            endpoints: AuthEndpoints::default(),
            storage_namespace: "oauth_credentials".to_string(),
            redirect_uri: None,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
        }
    }
}

/// Shared state reachable from foreground callers and background tasks.
struct Inner {
    credential: RwLock<Credential>,
    store: TokenStore,
    token_client: TokenClient,
    http_client: Arc<dyn HttpClient>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    scope: String,
    default_redirect: Option<String>,
    /// Serializes refresh attempts (single-flight)
    refresh_lock: Mutex<()>,
    /// Bumped after every completed refresh; waiters compare to skip
    /// duplicate requests
    refresh_epoch: AtomicU64,
}

/// The OAuth2 token lifecycle manager.
///
/// See the [module docs](self) for an overview. All operations are safe to
/// call concurrently; the manager is normally held in an `Arc` shared between
/// the UI layer and background tasks.
pub struct TokenLifecycleManager {
    inner: Arc<Inner>,
    /// Owned handle of the recurring expiry monitor
    monitor: StdMutex<Option<JoinHandle<()>>>,
}

impl TokenLifecycleManager {
    /// Creates a manager, restores persisted credential state, and starts the
    /// expiry monitor at the configured interval.
    ///
    /// Config-supplied client keys take precedence over persisted ones;
    /// persisted keys are adopted where the config is silent.
    pub async fn new(
        config: AuthConfig,
        http_client: Arc<dyn HttpClient>,
        key_value_store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Arc<Self> {
        let store = TokenStore::new(key_value_store, config.storage_namespace);

        let credential = match store.load().await {
            Some(mut record) => {
                record.client_id = config.client_id.or(record.client_id);
                record.client_secret = config.client_secret.or(record.client_secret);
                Credential::from_record(record)
            }
            None => Credential::from_keys(config.client_id, config.client_secret),
        };

        let manager = Arc::new(Self {
            inner: Arc::new(Inner {
                credential: RwLock::new(credential),
                store,
                token_client: TokenClient::new(config.endpoints, http_client.clone()),
                http_client,
                navigator,
                clock,
                event_bus,
                scope: config.scope,
                default_redirect: config.redirect_uri,
                refresh_lock: Mutex::new(()),
                refresh_epoch: AtomicU64::new(0),
            }),
            monitor: StdMutex::new(None),
        });

        manager.start_expiry_monitor(config.monitor_interval);

        info!("Token lifecycle manager initialized");
        manager
    }

    /// Creates a manager from a validated [`CoreConfig`].
    pub async fn from_config(core: &CoreConfig, auth: AuthConfig) -> Arc<Self> {
        let event_bus = EventBus::new(core.event_buffer_size);
        Self::new(
            auth,
            core.http_client.clone(),
            core.key_value_store.clone(),
            core.navigator.clone(),
            core.clock.clone(),
            event_bus,
        )
        .await
    }

    /// The bus carrying [`AuthEvent`] notifications from this manager.
    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Begins the authorization-code flow by transferring control to the
    /// authorization server.
    ///
    /// This is a full navigation: on web hosts the document unloads and
    /// nothing meaningful runs after it. The user lands back on the redirect
    /// URI with a `code` parameter, which [`complete_authorization`] picks
    /// up on the next load.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Configuration`] without a client ID
    ///
    /// [`complete_authorization`]: Self::complete_authorization
    #[instrument(skip(self))]
    pub async fn initiate_authorization(&self, redirect_uri: Option<&str>) -> Result<()> {
        let client_id = {
            let credential = self.inner.credential.read().await;
            credential.client_id().map(str::to_string)
        }
        .ok_or_else(|| {
            AuthError::Configuration("Client ID is required to initiate authorization".to_string())
        })?;

        let redirect = self.inner.resolve_redirect(redirect_uri).await?;
        let url = self
            .inner
            .token_client
            .authorize_url(&client_id, &self.inner.scope, &redirect)?;

        info!("Transferring control to the authorization server");
        self.inner
            .navigator
            .assign(url)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))
    }

    /// Completes the authorization-code flow if the current location carries
    /// a `code` parameter.
    ///
    /// Safe to call unconditionally on every page load: without a code it is
    /// a no-op returning `Ok(false)`. With one, the code is exchanged and
    /// then stripped from the visible location so a reload cannot replay it.
    ///
    /// # Errors
    ///
    /// Exchange failures propagate (see [`exchange_code_for_tokens`]).
    ///
    /// [`exchange_code_for_tokens`]: Self::exchange_code_for_tokens
    #[instrument(skip(self))]
    pub async fn complete_authorization(&self, redirect_uri: Option<&str>) -> Result<bool> {
        let location = self
            .inner
            .navigator
            .current_location()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let code = location
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned());

        let Some(code) = code else {
            debug!("No authorization code in current location");
            return Ok(false);
        };

        self.exchange_code_for_tokens(&code, redirect_uri).await?;

        let cleaned = strip_query_param(&location, "code");
        if let Err(e) = self.inner.navigator.replace(cleaned).await {
            warn!(error = %e, "Failed to clear authorization code from location");
        }

        Ok(true)
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// On success the credential becomes `Authenticated`, the record is
    /// persisted, and `Authorized` / `TokenRefreshed` events are emitted.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Configuration`] without both client ID and secret
    /// - [`AuthError::TokenExchange`] when the provider rejects the code
    /// - [`AuthError::Transport`] on network failure
    #[instrument(skip(self, code))]
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<()> {
        let inner = &self.inner;

        let (client_id, client_secret) = {
            let credential = inner.credential.read().await;
            (
                credential.client_id().map(str::to_string),
                credential.client_secret().map(str::to_string),
            )
        };
        let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
            return Err(AuthError::Configuration(
                "Client ID and client secret are required for token exchange".to_string(),
            ));
        };

        let redirect = inner.resolve_redirect(redirect_uri).await?;
        let grant = inner
            .token_client
            .exchange_code(&client_id, &client_secret, code, &redirect)
            .await?;

        let now = inner.clock.now();
        let access = AccessToken::from_expires_in(grant.access_token.clone(), grant.expires_in, now);
        let expires_at = access.expires_at;

        let record = {
            let mut credential = inner.credential.write().await;
            *credential = std::mem::replace(&mut *credential, Credential::Unconfigured)
                .apply_grant(access, normalize_refresh(grant.refresh_token));
            credential.to_record()
        };
        inner.store.save(&record).await;

        let _ = inner
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::Authorized { expires_at }));
        let _ = inner
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                access_token: grant.access_token,
                expires_at,
            }));

        info!("Authorization code exchange completed");
        Ok(())
    }

    /// Obtains a fresh access token using the stored refresh token.
    ///
    /// Single-flight: concurrent callers (foreground retry, background
    /// monitor) serialize on one lock, and whoever waited behind a completed
    /// refresh returns without issuing a duplicate request.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Configuration`] when refresh token, client ID, or
    ///   client secret is missing
    /// - [`AuthError::TokenRefresh`] when the provider rejects the refresh;
    ///   the existing credential state is left untouched
    /// - [`AuthError::Transport`] on network failure
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Result<()> {
        self.inner.refresh_access_token().await
    }

    /// Reports how much lifetime the access token has left.
    ///
    /// Returns `None` when neither an expiry nor a refresh token is known.
    /// When the remaining lifetime is inside the refresh window (more than
    /// zero, under five minutes), a background refresh is dispatched; its
    /// failure is emitted as `AuthEvent::AutoRefreshFailed`, never thrown
    /// here. A fully expired token schedules nothing.
    pub async fn check_expiry(&self) -> Option<ExpiryStatus> {
        Inner::check_expiry(&self.inner).await
    }

    /// Starts the recurring expiry monitor, replacing any existing one.
    ///
    /// The monitor is the sole background activity of the manager: a timer
    /// invoking [`check_expiry`](Self::check_expiry) every `interval`.
    pub fn start_expiry_monitor(&self, interval: Duration) {
        let mut guard = self.monitor.lock().expect("monitor lock poisoned");
        if let Some(handle) = guard.take() {
            handle.abort();
        }

        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval's first tick completes immediately; consume it so the
            // first check lands one full interval after start
            ticker.tick().await;
            loop {
                ticker.tick().await;
                Inner::check_expiry(&inner).await;
            }
        }));

        debug!(interval_secs = interval.as_secs(), "Expiry monitor started");
    }

    /// Stops the expiry monitor. Idempotent.
    pub fn stop_expiry_monitor(&self) {
        if let Some(handle) = self
            .monitor
            .lock()
            .expect("monitor lock poisoned")
            .take()
        {
            handle.abort();
            debug!("Expiry monitor stopped");
        }
    }

    /// Tears down background activity. Call once when discarding the manager.
    pub fn shutdown(&self) {
        self.stop_expiry_monitor();
    }

    /// The `Authorization` header value for the current access token.
    ///
    /// # Errors
    ///
    /// [`AuthError::NoToken`] when no access token is held.
    pub async fn auth_header_value(&self) -> Result<String> {
        self.inner.auth_header_value().await
    }

    /// Executes a request with the bearer header injected, retrying once
    /// after an expired-credential rejection.
    ///
    /// On a 401 with a refresh token available: exactly one refresh, one
    /// reissue with the refreshed header, and the second response is
    /// returned whatever its status. A second 401 goes back to the caller,
    /// bounding the retry cost at one. A non-401 first response, or a 401
    /// without refresh capability, is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoToken`] when no access token is held
    /// - [`AuthError::Transport`] from either attempt
    /// - refresh errors propagate when the retry path fails to refresh
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn authenticated_request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let inner = &self.inner;

        let header = inner.auth_header_value().await?;
        let first = inner
            .http_client
            .execute(request.clone().header("Authorization", header))
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !first.is_unauthorized() {
            return Ok(first);
        }

        if inner.credential.read().await.refresh_token().is_none() {
            debug!("401 without refresh capability; returning response as-is");
            return Ok(first);
        }

        info!("Request rejected with 401; refreshing token and retrying once");
        inner.refresh_access_token().await?;

        let header = inner.auth_header_value().await?;
        let second = inner
            .http_client
            .execute(request.header("Authorization", header))
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(second)
    }

    /// Read-only snapshot of the credential state.
    ///
    /// Delegates to [`check_expiry`](Self::check_expiry) and therefore shares
    /// its background-refresh dispatch when the token is inside the refresh
    /// window.
    pub async fn status(&self) -> AuthStatus {
        let expiry = Inner::check_expiry(&self.inner).await;
        let credential = self.inner.credential.read().await;
        let has_access_token = credential.access_token().is_some();

        AuthStatus {
            has_access_token,
            has_refresh_token: credential.refresh_token().is_some(),
            is_authenticated: has_access_token && !expiry.is_some_and(|s| s.expired),
            can_auto_refresh: credential.refresh_token().is_some()
                && credential.client_secret().is_some(),
            expiry,
        }
    }

    /// Drops access token, refresh token, and expiry together and persists
    /// the cleared state. Client keys are untouched.
    pub async fn clear_tokens(&self) {
        let record = {
            let mut credential = self.inner.credential.write().await;
            *credential =
                std::mem::replace(&mut *credential, Credential::Unconfigured).without_tokens();
            credential.to_record()
        };
        self.inner.store.save(&record).await;

        let _ = self
            .inner
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokensCleared));

        info!("Tokens cleared");
    }
}

impl Drop for TokenLifecycleManager {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.monitor.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl Inner {
    async fn auth_header_value(&self) -> Result<String> {
        let credential = self.credential.read().await;
        match credential.access_token() {
            Some(access) => Ok(format!("Bearer {}", access.token)),
            None => Err(AuthError::NoToken),
        }
    }

    /// Resolve the redirect URI: explicit argument, configured default, or
    /// the current location with query and fragment stripped.
    async fn resolve_redirect(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(uri) = explicit {
            return Ok(uri.to_string());
        }
        if let Some(uri) = &self.default_redirect {
            return Ok(uri.clone());
        }

        let mut location = self
            .navigator
            .current_location()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        location.set_query(None);
        location.set_fragment(None);
        Ok(location.to_string())
    }

    async fn refresh_access_token(&self) -> Result<()> {
        let epoch = self.refresh_epoch.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        if self.refresh_epoch.load(Ordering::Acquire) != epoch {
            debug!("Refresh already completed by a concurrent caller");
            return Ok(());
        }

        let (client_id, client_secret, refresh_token) = {
            let credential = self.credential.read().await;
            (
                credential.client_id().map(str::to_string),
                credential.client_secret().map(str::to_string),
                credential.refresh_token().map(str::to_string),
            )
        };
        let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (client_id, client_secret, refresh_token)
        else {
            return Err(AuthError::Configuration(
                "Missing credentials for refresh: refresh token, client ID, and client secret \
                 are all required"
                    .to_string(),
            ));
        };

        // A failed refresh returns here without touching credential state
        let grant = self
            .token_client
            .refresh(&client_id, &client_secret, &refresh_token)
            .await?;

        let now = self.clock.now();
        let access = AccessToken::from_expires_in(grant.access_token.clone(), grant.expires_in, now);
        let expires_at = access.expires_at;

        let record = {
            let mut credential = self.credential.write().await;
            *credential = std::mem::replace(&mut *credential, Credential::Unconfigured)
                .apply_grant(access, normalize_refresh(grant.refresh_token));
            credential.to_record()
        };
        self.store.save(&record).await;
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
            access_token: grant.access_token,
            expires_at,
        }));

        info!("Access token refreshed");
        Ok(())
    }

    async fn check_expiry(inner: &Arc<Inner>) -> Option<ExpiryStatus> {
        let now = inner.clock.now();
        let status = {
            let credential = inner.credential.read().await;
            match &*credential {
                Credential::Authenticated { access, .. } => {
                    let time_left = access.time_left(now);
                    Some(ExpiryStatus {
                        expired: time_left <= TimeDelta::zero(),
                        time_left,
                        minutes_left: time_left.num_minutes(),
                    })
                }
                Credential::Renewable { .. } => Some(ExpiryStatus {
                    expired: true,
                    time_left: TimeDelta::zero(),
                    minutes_left: 0,
                }),
                _ => None,
            }
        };

        if let Some(status) = &status {
            let in_window =
                !status.expired && status.time_left < TimeDelta::seconds(REFRESH_WINDOW_SECS);
            if in_window {
                debug!(
                    minutes_left = status.minutes_left,
                    "Access token expiring soon; dispatching background refresh"
                );
                let task_inner = Arc::clone(inner);
                tokio::spawn(async move {
                    if let Err(err) = task_inner.refresh_access_token().await {
                        warn!(error = %err, "Background token refresh failed");
                        let _ = task_inner.event_bus.emit(CoreEvent::Auth(
                            AuthEvent::AutoRefreshFailed {
                                message: err.to_string(),
                            },
                        ));
                    }
                });
            }
        }

        status
    }
}

/// Treat an empty refresh token the same as an absent one.
fn normalize_refresh(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

/// Remove one query parameter, leaving the rest of the URL intact.
fn strip_query_param(url: &Url, name: &str) -> Url {
    let mut cleaned = url.clone();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    cleaned.set_query(None);
    if !remaining.is_empty() {
        cleaned.query_pairs_mut().extend_pairs(remaining);
    }
    cleaned
}
