use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{KeyValueStorage, StorageChange, StorageError, StorageResult};
use crate::observer::{Handler, HandlerRegistry, Subscription};

struct Shared {
    slots: HashMap<String, String>,
    tabs: Vec<(u64, HandlerRegistry<StorageChange>)>,
    next_tab: u64,
    available: bool,
}

/// In-process storage with browser `localStorage` semantics.
///
/// Every handle is one "tab". Handles opened with [`MemoryStorage::open_tab`]
/// share the same slots; a write through one handle notifies the others,
/// and only when the stored value actually changed.
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Arc<Mutex<Shared>>,
    tab_id: u64,
    events: HandlerRegistry<StorageChange>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let events = HandlerRegistry::new();
        let shared = Shared {
            slots: HashMap::new(),
            tabs: vec![(0, events.clone())],
            next_tab: 1,
            available: true,
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
            tab_id: 0,
            events,
        }
    }

    /// Another tab over the same origin storage
    pub fn open_tab(&self) -> Self {
        let events = HandlerRegistry::new();
        let tab_id = {
            let mut shared = self.shared.lock();
            let id = shared.next_tab;
            shared.next_tab += 1;
            shared.tabs.push((id, events.clone()));
            id
        };
        Self {
            shared: Arc::clone(&self.shared),
            tab_id,
            events,
        }
    }

    /// Simulate disabled storage (privacy mode, blocked cookies).
    pub fn set_available(&self, available: bool) {
        self.shared.lock().available = available;
    }

    fn write(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        let listeners = {
            let mut shared = self.shared.lock();
            if !shared.available {
                return Err(StorageError::Unavailable("storage disabled".into()));
            }

            let previous = match value {
                Some(v) => shared.slots.insert(key.to_string(), v.to_string()),
                None => shared.slots.remove(key),
            };
            if previous.as_deref() == value {
                return Ok(());
            }

            shared
                .tabs
                .iter()
                .filter(|(id, _)| *id != self.tab_id)
                .map(|(_, registry)| registry.clone())
                .collect::<Vec<_>>()
        };

        let change = StorageChange {
            key: Some(key.to_string()),
            new_value: value.map(str::to_string),
        };
        for registry in listeners {
            registry.emit(&change);
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let shared = self.shared.lock();
        if !shared.available {
            return Err(StorageError::Unavailable("storage disabled".into()));
        }
        Ok(shared.slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.write(key, Some(value))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.write(key, None)
    }

    fn subscribe(&self, handler: Handler<StorageChange>) -> Subscription {
        self.events.subscribe(handler)
    }
}
