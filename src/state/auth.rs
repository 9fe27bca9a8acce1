use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use parking_lot::Mutex;
use thiserror::Error;

use crate::api::IdentityProvider;
use crate::models::{normalize, AuthenticatedUser, UserProfile, UserUpdate};
use crate::storage::PersistentUserCache;

/// Current authentication state of this tab
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<AuthenticatedUser>,
    pub profile: Option<UserProfile>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub is_initialized: bool,
}

impl AuthState {
    pub fn is_vendor_or_above(&self) -> bool {
        self.user.as_ref().map(|u| u.role.is_vendor_or_above()).unwrap_or(false)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.name.as_str())
    }

    /// Routing decisions are only allowed once this is true.
    pub fn is_ready(&self) -> bool {
        self.is_initialized && !self.is_loading
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No authenticated user")]
    NoUser,

    #[error("Profile belongs to {found}, current user is {expected}")]
    ProfileMismatch { expected: String, found: String },
}

struct Inner {
    state: AuthState,
    generation: u64,
    /// Sequence number of the last cache write handed out
    revision: u64,
    bootstrap_started: bool,
    watchers: Vec<UnboundedSender<AuthState>>,
}

/// Single source of truth for the tab's auth state.
///
/// Cheap to clone; clones share state. Every mutation is applied under one
/// lock, so no reader ever sees `is_authenticated` disagree with `user`.
/// Cache writes are sequenced by revision, so the cache never ends up
/// behind the state it mirrors.
#[derive(Clone)]
pub struct AuthStateStore {
    inner: Arc<Mutex<Inner>>,
    persisted: Arc<Mutex<u64>>,
    cache: PersistentUserCache,
}

enum Persist {
    Skip,
    Save(Option<AuthenticatedUser>),
}

impl AuthStateStore {
    pub fn new(cache: PersistentUserCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: AuthState::default(),
                generation: 0,
                revision: 0,
                bootstrap_started: false,
                watchers: Vec::new(),
            })),
            persisted: Arc::new(Mutex::new(0)),
            cache,
        }
    }

    pub fn cache(&self) -> &PersistentUserCache {
        &self.cache
    }

    pub fn snapshot(&self) -> AuthState {
        self.inner.lock().state.clone()
    }

    /// Bumped by every completed identity mutation
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Stream of snapshots, one per state change
    pub fn changes(&self) -> UnboundedReceiver<AuthState> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.lock().watchers.push(tx);
        rx
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Replace the current user. Leaves the loading/initialized flags alone.
    pub fn set_user(&self, user: Option<AuthenticatedUser>) {
        self.mutate(true, |state| {
            let user = user.map(normalize);
            Self::assign_user(state, user.clone());
            Persist::Save(user)
        });
    }

    /// Authentication completed interactively
    pub fn login(&self, user: AuthenticatedUser) {
        tracing::info!(user_id = %user.id, "User logged in");
        self.mutate(true, |state| {
            let user = normalize(user);
            Self::assign_user(state, Some(user.clone()));
            state.is_loading = false;
            state.is_initialized = true;
            Persist::Save(Some(user))
        });
    }

    /// Idempotent; safe to call when already logged out.
    pub fn logout(&self) {
        self.mutate(true, |state| {
            if let Some(user) = &state.user {
                tracing::info!(user_id = %user.id, "User logged out");
            }
            Self::assign_user(state, None);
            state.is_loading = false;
            state.is_initialized = true;
            Persist::Save(None)
        });
    }

    /// Remote sign-out followed by an unconditional local logout
    pub async fn sign_out(&self, provider: &dyn IdentityProvider) {
        self.set_loading(true);
        if let Err(e) = provider.sign_out().await {
            tracing::warn!("Remote sign-out failed, logging out locally anyway: {}", e);
        }
        self.logout();
    }

    /// Override the derived profile with richer data.
    ///
    /// The profile must belong to the current user; its identity fields
    /// are taken from the store so id and role cannot drift.
    pub fn set_profile(&self, profile: Option<UserProfile>) -> Result<(), StateError> {
        let mut result = Ok(());
        self.mutate(false, |state| {
            result = match (profile, &state.user) {
                (None, _) => {
                    state.profile = None;
                    Ok(())
                }
                (Some(_), None) => Err(StateError::NoUser),
                (Some(profile), Some(user)) if profile.user.id != user.id => Err(StateError::ProfileMismatch {
                    expected: user.id.clone(),
                    found: profile.user.id,
                }),
                (Some(mut profile), Some(user)) => {
                    profile.user = user.clone();
                    state.profile = Some(profile);
                    Ok(())
                }
            };
            Persist::Skip
        });
        if let Err(e) = &result {
            tracing::warn!("Rejected profile override: {}", e);
        }
        result
    }

    /// Merge into the current user. Returns false when nobody is logged in.
    pub fn update_user(&self, update: &UserUpdate) -> bool {
        let mut applied = false;
        self.mutate(true, |state| {
            let Some(current) = state.user.clone() else {
                return Persist::Skip;
            };
            let mut user = current;
            user.apply(update);
            let user = normalize(user);

            match state.profile.as_mut() {
                Some(profile) => profile.refresh_from(&user, update),
                None => state.profile = Some(UserProfile::derive(&user)),
            }
            state.user = Some(user.clone());
            applied = true;
            Persist::Save(Some(user))
        });
        applied
    }

    /// Mark a provider call in flight (or finished).
    pub fn set_loading(&self, loading: bool) {
        self.mutate(false, |state| {
            state.is_loading = loading;
            Persist::Skip
        });
    }

    /// Enter the bootstrap window. Returns the generation observed at
    /// entry, or `None` if bootstrap already ran in this store.
    pub(crate) fn begin_bootstrap(&self) -> Option<u64> {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.bootstrap_started {
                return None;
            }
            inner.bootstrap_started = true;
            inner.generation
        };
        self.set_loading(true);
        Some(generation)
    }

    /// Leave the bootstrap window: always reaches a terminal state.
    pub(crate) fn finish_bootstrap(&self) {
        self.mutate(false, |state| {
            state.is_loading = false;
            state.is_initialized = true;
            Persist::Skip
        });
    }

    /// `set_user` unless a newer mutation landed since `generation`.
    pub(crate) fn set_user_if_current(&self, generation: u64, user: Option<AuthenticatedUser>) -> bool {
        let mut applied = false;
        self.mutate_if(generation, |state| {
            let user = user.map(normalize);
            Self::assign_user(state, user.clone());
            applied = true;
            Persist::Save(user)
        });
        applied
    }

    /// Adopt a user read back from the cache without writing it again.
    /// With `generation`, only if no newer mutation landed.
    pub(crate) fn adopt_cached(&self, generation: Option<u64>, user: Option<AuthenticatedUser>) -> bool {
        let mut applied = false;
        self.apply(generation, true, |state| {
            Self::assign_user(state, user.map(normalize));
            applied = true;
            Persist::Skip
        });
        applied
    }

    fn assign_user(state: &mut AuthState, user: Option<AuthenticatedUser>) {
        state.profile = user.as_ref().map(UserProfile::derive);
        state.is_authenticated = user.is_some();
        state.user = user;
    }

    fn mutate_if(&self, generation: u64, f: impl FnOnce(&mut AuthState) -> Persist) {
        self.apply(Some(generation), true, f);
    }

    fn mutate(&self, bumps_generation: bool, f: impl FnOnce(&mut AuthState) -> Persist) {
        self.apply(None, bumps_generation, f);
    }

    fn apply(
        &self,
        expected_generation: Option<u64>,
        bumps_generation: bool,
        f: impl FnOnce(&mut AuthState) -> Persist,
    ) {
        let (save, notify) = {
            let mut inner = self.inner.lock();
            if let Some(expected) = expected_generation {
                if inner.generation != expected {
                    tracing::debug!(
                        expected,
                        current = inner.generation,
                        "Discarding stale auth update"
                    );
                    return;
                }
            }

            let before = inner.state.clone();
            let persist = f(&mut inner.state);
            if bumps_generation {
                inner.generation += 1;
            }
            let save = match persist {
                Persist::Save(user) => {
                    inner.revision += 1;
                    Some((inner.revision, user))
                }
                Persist::Skip => None,
            };

            let snapshot = inner.state.clone();
            if snapshot != before {
                inner
                    .watchers
                    .retain(|tx| tx.unbounded_send(snapshot.clone()).is_ok());
            }
            (save, snapshot != before)
        };

        // storage notifies other tabs synchronously, so write outside the state lock
        if let Some((revision, user)) = save {
            let mut persisted = self.persisted.lock();
            if revision > *persisted {
                self.cache.save(user.as_ref());
                *persisted = revision;
            } else {
                tracing::trace!(revision, "Skipping superseded cache write");
            }
        }
        if notify {
            tracing::trace!("Auth state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserOrigin, UserRole};
    use crate::storage::{KeyValueStorage, MemoryStorage};
    use futures::StreamExt;

    fn store() -> (AuthStateStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let cache = PersistentUserCache::new(Arc::new(storage.clone()), "auth.user", "user");
        (AuthStateStore::new(cache), storage)
    }

    fn user(id: &str) -> AuthenticatedUser {
        let mut user = AuthenticatedUser::new(id, format!("{id}@example.com"), "Layla Haddad");
        user.is_verified = true;
        user.location = Some("Riyadh, Riyadh Province".into());
        user
    }

    fn assert_consistent(state: &AuthState) {
        assert_eq!(state.is_authenticated, state.user.is_some());
        if state.profile.is_some() {
            assert!(state.user.is_some());
        }
        if let (Some(user), Some(profile)) = (&state.user, &state.profile) {
            assert_eq!(user.id, profile.user.id);
            assert_eq!(user.role, profile.user.role);
        }
    }

    #[test]
    fn test_concurrent_writers_leave_cache_matching_state() {
        let (store, _storage) = store();

        std::thread::scope(|scope| {
            for id in ["u1", "u2", "u3", "u4"] {
                let store = store.clone();
                scope.spawn(move || {
                    for i in 0..200 {
                        if i % 3 == 0 {
                            store.logout();
                        } else {
                            store.login(user(id));
                        }
                    }
                });
            }
        });

        let cached = store.cache().load().map(|u| u.id);
        assert_eq!(cached.as_deref(), store.snapshot().user_id());
    }

    #[test]
    fn test_initial_state_is_empty() {
        let (store, _) = store();
        assert_eq!(store.snapshot(), AuthState::default());
    }

    #[test]
    fn test_set_user_derives_profile_and_persists() {
        let (store, _) = store();
        store.set_user(Some(user("u1")));

        let state = store.snapshot();
        assert!(state.is_authenticated);
        assert!(!state.is_initialized);
        let profile = state.profile.unwrap();
        assert_eq!(profile.first_name, "Layla");
        assert_eq!(profile.last_name, "Haddad");
        assert_eq!(store.cache().load().unwrap().id, "u1");
    }

    #[test]
    fn test_set_user_none_clears_everything() {
        let (store, _) = store();
        store.set_user(Some(user("u1")));
        store.set_user(None);

        let state = store.snapshot();
        assert!(!state.is_authenticated);
        assert!(state.profile.is_none());
        assert!(store.cache().load().is_none());
    }

    #[test]
    fn test_login_completes_initialization() {
        let (store, _) = store();
        store.set_loading(true);
        store.login(user("u1"));

        let state = store.snapshot();
        assert!(state.is_initialized);
        assert!(!state.is_loading);
        assert!(state.is_authenticated);
        assert_eq!(state.user.unwrap().origin, UserOrigin::Local);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let (store, _) = store();
        store.login(user("u1"));
        store.logout();
        let after_first = store.snapshot();

        store.logout();
        assert_eq!(store.snapshot(), after_first);
        assert!(after_first.is_initialized);
        assert!(!after_first.is_authenticated);
    }

    #[test]
    fn test_update_user_without_user_is_noop() {
        let (store, _) = store();
        assert!(!store.update_user(&UserUpdate::name("X")));
        assert_eq!(store.snapshot(), AuthState::default());
    }

    #[test]
    fn test_update_location_keeps_first_name() {
        let (store, _) = store();
        store.login(user("u1"));

        let mut profile = store.snapshot().profile.unwrap();
        profile.first_name = "Lulu".into();
        profile.bio = Some("Perfumes".into());
        store.set_profile(Some(profile)).unwrap();

        assert!(store.update_user(&UserUpdate::location("Jeddah, Makkah Province")));

        let profile = store.snapshot().profile.unwrap();
        assert_eq!(profile.location_city.as_deref(), Some("Jeddah"));
        assert_eq!(profile.location_region.as_deref(), Some("Makkah Province"));
        assert_eq!(profile.first_name, "Lulu");
        assert_eq!(profile.bio.as_deref(), Some("Perfumes"));
        assert_eq!(
            store.cache().load().unwrap().location.as_deref(),
            Some("Jeddah, Makkah Province")
        );
    }

    #[test]
    fn test_set_profile_rejects_foreign_or_orphan_profiles() {
        let (store, _) = store();
        let foreign = UserProfile::derive(&user("u2"));
        assert_eq!(store.set_profile(Some(foreign.clone())), Err(StateError::NoUser));

        store.login(user("u1"));
        assert!(matches!(
            store.set_profile(Some(foreign)),
            Err(StateError::ProfileMismatch { .. })
        ));
    }

    #[test]
    fn test_set_profile_cannot_change_role() {
        let (store, _) = store();
        store.login(user("u1"));

        let mut profile = store.snapshot().profile.unwrap();
        profile.user.role = UserRole::Admin;
        store.set_profile(Some(profile)).unwrap();

        assert_eq!(store.snapshot().profile.unwrap().user.role, UserRole::Customer);
    }

    #[test]
    fn test_invariants_hold_for_operation_sequences() {
        let (store, _) = store();
        let scripts: [&[u8]; 4] = [
            &[0, 1, 2, 3, 4, 5],
            &[5, 4, 3, 2, 1, 0, 0, 3],
            &[2, 2, 1, 4, 0, 4, 5, 3],
            &[3, 5, 1, 1, 4, 2, 0],
        ];

        for script in scripts {
            for op in script {
                match op {
                    0 => store.set_user(Some(user("u1"))),
                    1 => store.set_user(None),
                    2 => store.login(user("u2")),
                    3 => store.logout(),
                    4 => {
                        store.update_user(&UserUpdate::location("Dammam, Eastern Province"));
                    }
                    _ => {
                        let profile = store.snapshot().user.as_ref().map(UserProfile::derive);
                        let _ = store.set_profile(profile);
                    }
                }
                assert_consistent(&store.snapshot());
            }
        }
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let (store, _) = store();
        let generation = store.begin_bootstrap().unwrap();
        store.login(user("u2"));

        assert!(!store.set_user_if_current(generation, None));
        assert_eq!(store.snapshot().user_id(), Some("u2"));
    }

    #[test]
    fn test_bootstrap_window_opens_once() {
        let (store, _) = store();
        assert!(store.begin_bootstrap().is_some());
        assert!(store.snapshot().is_loading);
        assert!(store.begin_bootstrap().is_none());
    }

    #[test]
    fn test_adopt_cached_does_not_write_back() {
        let (store, storage) = store();
        storage.set("auth.user", "{not json").unwrap();

        assert!(store.adopt_cached(None, Some(user("u1"))));
        assert!(store.snapshot().is_authenticated);
        assert_eq!(storage.get("auth.user").unwrap().as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_changes_stream_sees_each_transition() {
        let (store, _) = store();
        let mut changes = store.changes();

        store.login(user("u1"));
        store.logout();
        store.logout();

        let first = changes.next().await.unwrap();
        assert!(first.is_authenticated);
        let second = changes.next().await.unwrap();
        assert!(!second.is_authenticated);

        drop(store);
        assert!(changes.next().await.is_none());
    }
}
