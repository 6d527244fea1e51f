//! Credential Persistence
//!
//! Persists the credential record through the host's key-value store under a
//! single namespace key.
//!
//! Storage is best-effort by contract: the in-memory credential is always
//! authoritative within a session, and a store that is full, missing, or
//! holding an unparsable payload must never take the session down. Failures
//! are logged and degrade to "save reports false / load reports absent".

use crate::types::StoredCredential;
use bridge_traits::storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable persistence for the credential record.
///
/// Wraps a [`KeyValueStore`] and owns serialization of the record. The store
/// never interprets credential fields; it moves opaque JSON in and out of one
/// namespace key.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl TokenStore {
    /// Create a token store writing under the given namespace key.
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        debug!(namespace = %namespace, "Initializing TokenStore");
        Self { store, namespace }
    }

    /// The namespace key this store reads and writes.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Persist the record, replacing any prior value.
    ///
    /// Returns `false` (after logging) when serialization or the underlying
    /// write fails; callers proceed with their in-memory state.
    pub async fn save(&self, record: &StoredCredential) -> bool {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to serialize credential record"
                );
                return false;
            }
        };

        match self.store.set(&self.namespace, &json).await {
            Ok(()) => {
                debug!(
                    namespace = %self.namespace,
                    has_access_token = record.access_token.is_some(),
                    has_refresh_token = record.refresh_token.is_some(),
                    "Credential record persisted"
                );
                true
            }
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to persist credential record"
                );
                false
            }
        }
    }

    /// Load the record, if one exists and parses.
    ///
    /// Returns `None` for a missing key, a storage failure, or an unparsable
    /// payload. Corrupt payloads are logged and left in place to be
    /// overwritten by the next save.
    pub async fn load(&self) -> Option<StoredCredential> {
        let payload = match self.store.get(&self.namespace).await {
            Ok(payload) => payload?,
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to read credential record"
                );
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(record) => {
                debug!(namespace = %self.namespace, "Credential record loaded");
                Some(record)
            }
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Stored credential record is unparsable; starting empty"
                );
                None
            }
        }
    }
}
