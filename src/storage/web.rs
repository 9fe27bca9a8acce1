//! `localStorage` backend
//!
//! The storage object is looked up per call rather than held, so the
//! handle stays `Send + Sync` and survives storage being toggled at runtime.

use wasm_bindgen::{closure::Closure, JsCast, JsValue};

use super::{KeyValueStorage, StorageChange, StorageError, StorageResult};
use crate::observer::{Handler, Subscription};

#[derive(Debug, Clone, Copy, Default)]
pub struct WebStorage;

impl WebStorage {
    pub fn new() -> Self {
        Self
    }
}

fn local_storage() -> StorageResult<web_sys::Storage> {
    web_sys::window()
        .ok_or_else(|| StorageError::Unavailable("no window".into()))?
        .local_storage()
        .map_err(js_error)?
        .ok_or_else(|| StorageError::Unavailable("localStorage disabled".into()))
}

fn js_error(err: JsValue) -> StorageError {
    let text = format!("{err:?}");
    if text.contains("QuotaExceeded") {
        StorageError::QuotaExceeded
    } else {
        StorageError::Unavailable(text)
    }
}

impl KeyValueStorage for WebStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        local_storage()?.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        local_storage()?.set_item(key, value).map_err(js_error)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        local_storage()?.remove_item(key).map_err(js_error)
    }

    fn subscribe(&self, handler: Handler<StorageChange>) -> Subscription {
        let Some(window) = web_sys::window() else {
            tracing::warn!("No window; cross-tab notifications disabled");
            return Subscription::new(|| {});
        };

        let callback = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(
            move |event: web_sys::StorageEvent| {
                handler(&StorageChange {
                    key: event.key(),
                    new_value: event.new_value(),
                });
            },
        );

        if let Err(e) =
            window.add_event_listener_with_callback("storage", callback.as_ref().unchecked_ref())
        {
            tracing::warn!("Failed to listen for storage events: {:?}", e);
            return Subscription::new(|| {});
        }

        Subscription::new(move || {
            let _ = window
                .remove_event_listener_with_callback("storage", callback.as_ref().unchecked_ref());
        })
    }
}
