//! # Desktop Bridge Implementations
//!
//! Native reference adapters for the [`bridge-traits`](bridge_traits)
//! capability contracts:
//!
//! - [`ReqwestHttpClient`](http::ReqwestHttpClient) - HTTP via reqwest with
//!   retry and connection pooling
//! - [`SqliteKeyValueStore`](storage::SqliteKeyValueStore) - durable
//!   key-value persistence backed by SQLite
//! - [`InProcessNavigator`](navigation::InProcessNavigator) - navigation
//!   context for embedded-webview hosts and test harnesses
//!
//! Web hosts replace these with adapters over `fetch`, `localStorage`, and
//! `window.location`; the core only ever sees the traits.

pub mod http;
pub mod navigation;
pub mod storage;

pub use http::ReqwestHttpClient;
pub use navigation::InProcessNavigator;
pub use storage::SqliteKeyValueStore;
