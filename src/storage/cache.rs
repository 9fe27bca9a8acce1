use std::sync::Arc;

use super::{KeyValueStorage, StorageChange, StorageError};
use crate::models::{normalize, AuthenticatedUser};
use crate::observer::{Handler, Subscription};

/// Contents of the pre-migration storage slot
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyEntry {
    Absent,
    Valid(AuthenticatedUser),
    Corrupt,
}

/// The locally persisted "authenticated user" slot.
///
/// Caching is an optimization: storage failures are logged and swallowed,
/// and malformed data reads as "no cached user".
#[derive(Clone)]
pub struct PersistentUserCache {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    legacy_key: String,
}

impl PersistentUserCache {
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        key: impl Into<String>,
        legacy_key: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            legacy_key: legacy_key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn legacy_key(&self) -> &str {
        &self.legacy_key
    }

    /// Store the normalized user, or clear the slot for `None`. Never fails.
    pub fn save(&self, user: Option<&AuthenticatedUser>) {
        let result = match user {
            Some(user) => serde_json::to_string(&normalize(user.clone()))
                .map_err(|e| StorageError::Serialization(e.to_string()))
                .and_then(|json| self.storage.set(&self.key, &json)),
            None => self.storage.remove(&self.key),
        };

        if let Err(e) = result {
            tracing::warn!(key = %self.key, "Failed to persist cached user: {}", e);
        }
    }

    /// Read the cached user. Corrupt entries are left in place.
    pub fn load(&self) -> Option<AuthenticatedUser> {
        let raw = self.read(&self.key)?;
        match serde_json::from_str::<AuthenticatedUser>(&raw) {
            Ok(user) => Some(normalize(user)),
            Err(e) => {
                tracing::warn!(key = %self.key, "Ignoring malformed cached user: {}", e);
                None
            }
        }
    }

    /// Whether the primary slot holds anything at all, parseable or not
    pub fn has_entry(&self) -> bool {
        self.read(&self.key).is_some()
    }

    pub fn load_legacy(&self) -> LegacyEntry {
        let Some(raw) = self.read(&self.legacy_key) else {
            return LegacyEntry::Absent;
        };
        match serde_json::from_str::<AuthenticatedUser>(&raw) {
            Ok(user) => LegacyEntry::Valid(normalize(user)),
            Err(_) => LegacyEntry::Corrupt,
        }
    }

    pub fn remove_legacy(&self) {
        if let Err(e) = self.storage.remove(&self.legacy_key) {
            tracing::warn!(key = %self.legacy_key, "Failed to remove legacy cache entry: {}", e);
        }
    }

    /// Changes made to the storage area by other tabs
    pub fn subscribe(&self, handler: Handler<StorageChange>) -> Subscription {
        self.storage.subscribe(handler)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(key = %key, "Cache read failed: {}", e);
                None
            }
        }
    }
}
