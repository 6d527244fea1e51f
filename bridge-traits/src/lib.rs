//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the content automation core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per host
//! (web page, desktop webview, headless test harness).
//!
//! ## Traits
//!
//! ### Networking & Navigation
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`Navigator`](navigation::Navigator) - Current location, navigation, history rewrite
//!
//! ### Storage
//! - [`KeyValueStore`](storage::KeyValueStore) - Durable key-value persistence
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Fail-Fast Strategy
//!
//! The core should fail fast with descriptive errors when a required
//! capability is missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! pub fn build(self) -> Result<CoreConfig> {
//!     let http_client = self.http_client
//!         .ok_or_else(|| Error::CapabilityMissing {
//!             capability: "HttpClient".to_string(),
//!             message: "No HTTP client implementation provided. \
//!                      Desktop: use bridge_desktop::ReqwestHttpClient. \
//!                      Web: inject the host fetch adapter.".to_string()
//!         })?;
//!     // ...
//! }
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling. Platform implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Provide actionable error messages
//! - Include error context (e.g., storage keys, network status)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod http;
pub mod navigation;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use navigation::Navigator;
pub use storage::KeyValueStore;
pub use time::{Clock, SystemClock};
