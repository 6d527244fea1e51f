//! Key-Value Storage Abstraction
//!
//! Provides a platform-agnostic trait for durable key-value persistence.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value storage trait
///
/// Abstracts platform-specific persistent storage:
/// - Web: localStorage / IndexedDB
/// - Desktop: SQLite or OS-specific preference stores
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
///
/// Values are opaque strings; callers own serialization. The store is shared
/// process-wide: entries written by one component are visible to every other
/// component holding the same store, and writes are last-write-wins.
///
/// `set` must replace any prior value atomically from the caller's
/// perspective: readers never observe a partially-written value.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn remember(store: &dyn KeyValueStore) -> Result<()> {
///     store.set("last_run", "2026-08-06T00:00:00Z").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store a value, replacing any existing value for the key
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a value
    ///
    /// Idempotent: succeeds even if the key doesn't exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists without retrieving its value
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// List all stored keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove all entries
    ///
    /// Use with caution! This clears every namespace sharing the store.
    async fn clear_all(&self) -> Result<()>;
}
