use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::StreamExt;

use crate::api::{IdentityProvider, ProfileStore};
use crate::models::{AuthEvent, AuthEventKind};
use crate::observer::Subscription;
use crate::platform::timeout;
use crate::state::AuthStateStore;

/// Applies the provider's session change events to the store.
///
/// Events are queued in emission order and handled one at a time, so a
/// slow profile fetch never lets a later event overtake an earlier one.
/// The provider subscription ends when this is dropped or detached.
pub struct RemoteAuthEventListener {
    profiles: Arc<dyn ProfileStore>,
    store: AuthStateStore,
    read_timeout: Duration,
    events: UnboundedReceiver<AuthEvent>,
    subscription: Option<Subscription>,
}

impl RemoteAuthEventListener {
    pub fn attach(
        provider: &dyn IdentityProvider,
        profiles: Arc<dyn ProfileStore>,
        store: AuthStateStore,
        read_timeout: Duration,
    ) -> Self {
        let (tx, events) = mpsc::unbounded();
        let subscription = provider.subscribe(Arc::new(move |event: &AuthEvent| {
            if tx.unbounded_send(event.clone()).is_err() {
                tracing::trace!("Auth event listener gone, dropping event");
            }
        }));

        Self {
            profiles,
            store,
            read_timeout,
            events,
            subscription: Some(subscription),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Stop receiving events. Already-queued events can still be drained.
    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            tracing::debug!("Auth event listener detached");
        }
    }

    /// Handle events until the subscription ends.
    pub async fn run(mut self) {
        while let Some(event) = self.events.next().await {
            self.handle(event).await;
        }
    }

    /// Handle whatever is queued right now. Returns how many events ran.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(Some(event)) = self.events.try_next() {
            self.handle(event).await;
            handled += 1;
        }
        handled
    }

    pub async fn handle(&self, event: AuthEvent) {
        tracing::debug!(kind = ?event.kind, "Auth event");

        match event.kind {
            AuthEventKind::SignedIn => match event.session {
                Some(session) => self.store.set_user(Some(session.user.minimal_user())),
                None => tracing::warn!("Signed-in event without a session"),
            },
            AuthEventKind::SignedOut => self.store.set_user(None),
            AuthEventKind::TokenRefreshed => {}
            AuthEventKind::UserUpdated => {
                let Some(session) = event.session else {
                    tracing::warn!("User-updated event without a session");
                    return;
                };
                self.refresh_profile(&session.user.id).await;
            }
        }
    }

    async fn refresh_profile(&self, user_id: &str) {
        let generation = self.store.generation();
        let fetched = timeout(self.read_timeout, self.profiles.get_profile_by_user_id(user_id)).await;

        let record = match fetched {
            Ok(Ok(Some(record))) => record,
            Ok(Ok(None)) => {
                tracing::debug!(user_id, "No profile yet, keeping current user");
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(user_id, "Profile fetch failed, keeping current user: {}", e);
                return;
            }
            Err(elapsed) => {
                tracing::warn!(user_id, "Profile fetch {}, keeping current user", elapsed);
                return;
            }
        };

        let user = record.to_user();
        if !self.store.set_user_if_current(generation, Some(user.clone())) {
            return;
        }
        if let Err(e) = self.store.set_profile(Some(record.overlay(&user))) {
            tracing::warn!(user_id, "Fetched profile not applied: {}", e);
        }
    }
}
