//! # Credential Core
//!
//! OAuth2 token lifecycle management for the content automation toolkit.
//!
//! ## Overview
//!
//! This crate owns bearer credentials end to end: the authorization-code
//! flow against the provider's consent screen, durable persistence of the
//! credential record, proactive refresh ahead of expiry, and an
//! authenticated-request wrapper that recovers from credential expiry
//! exactly once per call.
//!
//! ## Features
//!
//! - Authorization-code and refresh-token grants (RFC 6749)
//! - Credential state as a sum type; illegal partial states are
//!   unrepresentable
//! - Background expiry monitor with single-flight refresh
//! - Lifecycle notifications over the core event bus
//! - Best-effort persistence through the host key-value store

pub mod error;
pub mod manager;
pub mod oauth;
pub mod store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::{AuthConfig, TokenLifecycleManager, DEFAULT_MONITOR_INTERVAL};
pub use oauth::{AuthEndpoints, TokenClient, TokenGrant};
pub use store::TokenStore;
pub use types::{
    AccessToken, AuthStatus, ClientKeys, Credential, ExpiryStatus, StoredCredential,
};
