use std::sync::Arc;

use super::bootstrap::adoptable_cached_user;
use crate::observer::Subscription;
use crate::state::AuthStateStore;
use crate::storage::StorageChange;

/// Converges this tab onto whatever another tab last wrote to the cache.
///
/// Reads the current cache value on every relevant notification, so a
/// burst of writes settles on the last one.
pub struct CrossTabSync {
    subscription: Option<Subscription>,
}

impl CrossTabSync {
    pub fn attach(store: AuthStateStore) -> Self {
        let cache = store.cache().clone();
        let key = cache.key().to_string();

        let subscription = cache.subscribe(Arc::new(move |change: &StorageChange| {
            // no key: the other tab cleared the whole storage area
            if change.key.as_deref().is_some_and(|k| k != key) {
                return;
            }
            reconcile(&store);
        }));

        Self {
            subscription: Some(subscription),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

fn reconcile(store: &AuthStateStore) {
    let cached = adoptable_cached_user(store.cache());
    if store.snapshot().user == cached {
        return;
    }

    tracing::info!(
        user_id = cached.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
        "Adopting auth state from another tab"
    );
    store.adopt_cached(None, cached);
}
