//! # Core Configuration Module
//!
//! Provides configuration management for the content automation core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `CoreConfig` instance holding the host capabilities the core depends on.
//! It enforces fail-fast validation: every required bridge must be provided
//! before initialization, and a missing one produces an actionable
//! `CapabilityMissing` error instead of a runtime panic deep inside the core.
//!
//! ## Required Capabilities
//!
//! - `HttpClient` - token endpoint calls and authenticated API requests
//! - `KeyValueStore` - durable credential persistence
//! - `Navigator` - authorization redirects and callback handling
//!
//! ## Optional (with defaults)
//!
//! - `Clock` - defaults to the system clock; inject a manual clock in tests
//! - Event buffer size - defaults to
//!   [`DEFAULT_EVENT_BUFFER_SIZE`](crate::events::DEFAULT_EVENT_BUFFER_SIZE)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
//!     .key_value_store(kv_store)
//!     .navigator(navigator)
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, KeyValueStore, Navigator, SystemClock};
use std::sync::Arc;

/// Core configuration for the content automation core.
///
/// Holds the host capabilities and runtime settings required to initialize
/// the core. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for token endpoint calls and authenticated requests
    pub http_client: Arc<dyn HttpClient>,

    /// Durable key-value store for credential persistence
    pub key_value_store: Arc<dyn KeyValueStore>,

    /// Navigation context for authorization redirects
    pub navigator: Arc<dyn Navigator>,

    /// Time source (system clock unless overridden)
    pub clock: Arc<dyn Clock>,

    /// Buffer size for the core event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("key_value_store", &"KeyValueStore { ... }")
            .field("navigator", &"Navigator { ... }")
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`] with fail-fast capability validation.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    key_value_store: Option<Arc<dyn KeyValueStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client capability
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the key-value store capability
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_value_store = Some(store);
        self
    }

    /// Sets the navigation capability
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Overrides the time source (tests inject a manual clock here)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the event bus buffer size
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Validates capabilities and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] naming the first absent required
    /// capability.
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = self.http_client.ok_or_else(|| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "No HTTP client implementation provided. \
                      Desktop: use bridge_desktop::ReqwestHttpClient. \
                      Web: inject the host fetch adapter."
                .to_string(),
        })?;

        let key_value_store = self
            .key_value_store
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "KeyValueStore".to_string(),
                message: "No key-value store implementation provided. \
                          Desktop: use bridge_desktop::SqliteKeyValueStore. \
                          Web: inject the host localStorage adapter."
                    .to_string(),
            })?;

        let navigator = self.navigator.ok_or_else(|| Error::CapabilityMissing {
            capability: "Navigator".to_string(),
            message: "No navigation context provided. \
                      Desktop: use bridge_desktop::InProcessNavigator. \
                      Web: inject the host window.location adapter."
                .to_string(),
        })?;

        Ok(CoreConfig {
            http_client,
            key_value_store,
            navigator,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bridge_traits::BridgeError;
    use url::Url;

    struct StubHttpClient;

    #[async_trait]
    impl HttpClient for StubHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::OperationFailed("stub".to_string()))
        }
    }

    struct StubStore;

    #[async_trait]
    impl KeyValueStore for StubStore {
        async fn set(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn get(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(vec![])
        }

        async fn clear_all(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct StubNavigator;

    #[async_trait]
    impl Navigator for StubNavigator {
        async fn current_location(&self) -> BridgeResult<Url> {
            Ok(Url::parse("https://app.example.com/").unwrap())
        }

        async fn assign(&self, _url: Url) -> BridgeResult<()> {
            Ok(())
        }

        async fn replace(&self, _url: Url) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_build_with_all_capabilities() {
        let config = CoreConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .key_value_store(Arc::new(StubStore))
            .navigator(Arc::new(StubNavigator))
            .build()
            .unwrap();

        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_missing_http_client() {
        let result = CoreConfig::builder()
            .key_value_store(Arc::new(StubStore))
            .navigator(Arc::new(StubNavigator))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient");
            }
            other => panic!("Expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_navigator() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .key_value_store(Arc::new(StubStore))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "Navigator");
            }
            other => panic!("Expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_overrides() {
        let config = CoreConfig::builder()
            .http_client(Arc::new(StubHttpClient))
            .key_value_store(Arc::new(StubStore))
            .navigator(Arc::new(StubNavigator))
            .event_buffer_size(8)
            .build()
            .unwrap();

        assert_eq!(config.event_buffer_size, 8);
    }
}
