//! OAuth 2.0 Token Endpoint Protocol
//!
//! Implements the authorization-code and refresh-token grants of RFC 6749
//! against a configurable provider.
//!
//! # Overview
//!
//! The token client handles:
//! - Building authorization URLs for the consent redirect
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens
//!
//! # Security
//!
//! - Never logs sensitive values (tokens, codes, secrets)
//! - Tokens are treated as opaque strings; no client-side validation
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{AuthEndpoints, TokenClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let client = TokenClient::new(AuthEndpoints::default(), http_client);
//! let url = client.authorize_url(
//!     "your-client-id",
//!     "https://www.googleapis.com/auth/documents",
//!     "https://app.example.com/callback",
//! )?;
//! // Redirect the user to `url`...
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Authorization server endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    /// Authorization (consent) endpoint URL
    pub authorize_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl Default for AuthEndpoints {
    /// Google's OAuth 2.0 endpoints, the provider the toolkit ships against.
    fn default() -> Self {
        Self {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// A successful token-endpoint response.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// The new access token
    pub access_token: String,
    /// A refresh token, when the server chose to send one
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires
    pub expires_in: i64,
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Client for the provider's token endpoint.
///
/// Stateless: it holds endpoints and a transport, never credential state.
/// The lifecycle manager owns state and decides when to call which grant.
pub struct TokenClient {
    endpoints: AuthEndpoints,
    http_client: Arc<dyn HttpClient>,
}

impl TokenClient {
    /// Create a new token client.
    pub fn new(endpoints: AuthEndpoints, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            endpoints,
            http_client,
        }
    }

    /// Build the authorization URL for the consent redirect.
    ///
    /// Requests offline access with forced consent so the authorization
    /// server issues a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the configured authorization
    /// endpoint is not a valid URL.
    pub fn authorize_url(&self, client_id: &str, scope: &str, redirect_uri: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoints.authorize_url).map_err(|e| {
            AuthError::Configuration(format!("Invalid authorization endpoint: {}", e))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", scope);
            query.append_pair("access_type", "offline"); // Request refresh token
            query.append_pair("prompt", "consent");
        }

        debug!("Built authorization URL");

        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Issues a single form-encoded POST with `grant_type=authorization_code`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenExchange`] when the provider rejects the code or
    ///   responds without an access token (carries the provider payload)
    /// - [`AuthError::Transport`] on network-level failure
    #[instrument(skip(self, client_secret, code))]
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("client_id", client_id);
        params.insert("client_secret", client_secret);
        params.insert("redirect_uri", redirect_uri);

        debug!("Exchanging authorization code for tokens");

        let response = self.post_form(&params).await?;
        let status = response.status;
        let parsed: TokenResponse = response.json().unwrap_or_default();

        match parsed.access_token {
            Some(access_token) => {
                info!(
                    expires_in = parsed.expires_in,
                    "Authorization code exchanged for tokens"
                );
                Ok(TokenGrant {
                    access_token,
                    refresh_token: parsed.refresh_token,
                    expires_in: parsed.expires_in,
                })
            }
            None => {
                let body = provider_error(&parsed, &response);
                warn!(status = status, error = %body, "Token exchange failed");
                Err(AuthError::TokenExchange { status, body })
            }
        }
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Issues a single form-encoded POST with `grant_type=refresh_token`.
    /// The returned grant's `refresh_token` is `None` when the server
    /// withheld it, which is the common case.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenRefresh`] when the provider rejects the refresh
    /// - [`AuthError::Transport`] on network-level failure
    #[instrument(skip(self, client_secret, refresh_token))]
    pub async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", client_id);
        params.insert("client_secret", client_secret);

        debug!("Refreshing access token");

        let response = self.post_form(&params).await?;
        let status = response.status;
        let parsed: TokenResponse = response.json().unwrap_or_default();

        match parsed.access_token {
            Some(access_token) => {
                info!(expires_in = parsed.expires_in, "Access token refreshed");
                Ok(TokenGrant {
                    access_token,
                    refresh_token: parsed.refresh_token,
                    expires_in: parsed.expires_in,
                })
            }
            None => {
                let body = provider_error(&parsed, &response);
                warn!(status = status, error = %body, "Token refresh failed");
                Err(AuthError::TokenRefresh(format!(
                    "Token endpoint returned {}: {}",
                    status, body
                )))
            }
        }
    }

    async fn post_form(&self, params: &HashMap<&str, &str>) -> Result<HttpResponse> {
        let encoded = serde_urlencoded::to_string(params).map_err(|e| {
            AuthError::Configuration(format!("Failed to encode token request: {}", e))
        })?;

        let request = HttpRequest::new(HttpMethod::Post, self.endpoints.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded));

        self.http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))
    }
}

/// Format the provider's error payload for diagnostics.
fn provider_error(parsed: &TokenResponse, response: &HttpResponse) -> String {
    match (&parsed.error, &parsed.error_description) {
        (Some(error), Some(description)) => format!("{}: {}", error, description),
        (Some(error), None) => error.clone(),
        (None, _) => response
            .text()
            .unwrap_or_else(|_| "Unable to read error response".to_string()),
    }
}

/// Token response from the OAuth provider.
///
/// This structure represents the JSON response from the token endpoint, for
/// both the success shape and the `{error}` failure shape.
#[derive(Debug, Default, Deserialize, Serialize)]
struct TokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<String>,
}

fn default_expires_in() -> i64 {
    3600 // Default to 1 hour if not specified
}
