//! Browser key-value storage and the persistent user cache
//!
//! - [`KeyValueStorage`]: minimal string slot interface with change
//!   notifications from other tabs of the same origin
//! - [`MemoryStorage`]: in-process backend with per-tab handles
//! - `WebStorage`: `localStorage` backend (wasm only)
//! - [`PersistentUserCache`]: the serialized "authenticated user" slot

use thiserror::Error;

use crate::observer::{Handler, Subscription};

pub mod cache;
pub mod memory;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use cache::{LegacyEntry, PersistentUserCache};
pub use memory::MemoryStorage;
#[cfg(target_arch = "wasm32")]
pub use web::WebStorage;

/// Storage-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A write made by another tab, as reported by the `storage` event.
/// `key` is `None` when the other tab cleared the whole storage area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: Option<String>,
    pub new_value: Option<String>,
}

/// String key-value store shared by every tab of the origin
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Notifications for writes made by *other* tabs.
    /// The writing tab itself is never notified.
    fn subscribe(&self, handler: Handler<StorageChange>) -> Subscription;
}
