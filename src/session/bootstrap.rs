use std::sync::Arc;
use std::time::Duration;

use super::migration::{LegacyMigration, MigrationOutcome};
use crate::api::IdentityProvider;
use crate::models::AuthenticatedUser;
use crate::platform::timeout;
use crate::state::AuthStateStore;
use crate::storage::PersistentUserCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The provider had a live session
    RemoteSession { user_id: String },
    /// No session; a verified cached user was adopted
    CachedUser { user_id: String },
    /// Neither source produced a user
    SignedOut,
    /// A newer mutation landed while bootstrap was waiting; its result was dropped
    Superseded,
    /// Bootstrap already ran for this store
    AlreadyRan,
}

/// Startup reconciliation of the remote session against the local cache.
///
/// Runs once per store and always leaves it initialized and not loading,
/// whatever the provider does.
pub struct SessionBootstrap {
    provider: Arc<dyn IdentityProvider>,
    store: AuthStateStore,
    session_timeout: Duration,
}

impl SessionBootstrap {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: AuthStateStore, session_timeout: Duration) -> Self {
        Self {
            provider,
            store,
            session_timeout,
        }
    }

    pub async fn run(&self) -> BootstrapOutcome {
        let Some(generation) = self.store.begin_bootstrap() else {
            tracing::debug!("Session bootstrap already ran");
            return BootstrapOutcome::AlreadyRan;
        };

        let outcome = self.resolve(generation).await;
        self.store.finish_bootstrap();
        tracing::info!(?outcome, "Session bootstrap complete");
        outcome
    }

    async fn resolve(&self, generation: u64) -> BootstrapOutcome {
        let lookup = timeout(self.session_timeout, self.provider.get_current_session()).await;

        match lookup {
            Ok(Ok(Some(session))) => {
                // profile lookup is deliberately not awaited here
                let user = session.user.minimal_user();
                let user_id = user.id.clone();
                if self.store.set_user_if_current(generation, Some(user)) {
                    BootstrapOutcome::RemoteSession { user_id }
                } else {
                    BootstrapOutcome::Superseded
                }
            }
            Ok(Ok(None)) => self.fall_back_to_cache(generation),
            Ok(Err(e)) => {
                tracing::warn!("Session lookup failed, using cached user: {}", e);
                self.fall_back_to_cache(generation)
            }
            Err(elapsed) => {
                tracing::warn!("Session lookup {}, using cached user", elapsed);
                self.fall_back_to_cache(generation)
            }
        }
    }

    fn fall_back_to_cache(&self, generation: u64) -> BootstrapOutcome {
        if self.store.generation() != generation {
            return BootstrapOutcome::Superseded;
        }

        // the shim carries the old record over unconditionally
        let cached = match LegacyMigration::new(self.store.cache()).run() {
            MigrationOutcome::Migrated { user } => Some(user),
            _ => adoptable_cached_user(self.store.cache()),
        };
        let user_id = cached.as_ref().map(|u| u.id.clone());
        if !self.store.adopt_cached(Some(generation), cached) {
            return BootstrapOutcome::Superseded;
        }

        match user_id {
            Some(user_id) => BootstrapOutcome::CachedUser { user_id },
            None => BootstrapOutcome::SignedOut,
        }
    }
}

/// The cached user, if it may be trusted without a remote session
pub(crate) fn adoptable_cached_user(cache: &PersistentUserCache) -> Option<AuthenticatedUser> {
    match cache.load() {
        Some(user) if user.is_verified => Some(user),
        Some(user) => {
            tracing::debug!(user_id = %user.id, "Ignoring unverified cached user");
            None
        }
        None => None,
    }
}
