//! Explicit, constructible bundle of everything a tab's auth needs.
//!
//! One context per tab. Tests build isolated ones over in-memory storage.

use std::sync::Arc;

use crate::api::{ApiClient, HttpIdentityProvider, HttpProfileStore, IdentityProvider, ProfileStore};
use crate::config::BackendConfig;
use crate::error::AuthError;
use crate::models::{AuthenticatedUser, RoleDetails, SignUpRequest};
use crate::provisioning::ProfileProvisioner;
use crate::session::{
    actions, BootstrapOutcome, CrossTabSync, RemoteAuthEventListener, SessionBootstrap, SignupOutcome,
};
use crate::state::{AuthState, AuthStateStore};
use crate::storage::{KeyValueStorage, PersistentUserCache};

#[derive(Clone)]
pub struct AuthContext {
    config: Arc<BackendConfig>,
    store: AuthStateStore,
    provider: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
}

impl PartialEq for AuthContext {
    fn eq(&self, other: &Self) -> bool {
        self.store.ptr_eq(&other.store)
    }
}

impl AuthContext {
    pub fn new(
        config: BackendConfig,
        storage: Arc<dyn KeyValueStorage>,
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        let cache = PersistentUserCache::new(storage, &config.storage_key, &config.legacy_storage_key);
        Self {
            config: Arc::new(config),
            store: AuthStateStore::new(cache),
            provider,
            profiles,
        }
    }

    /// Wire the HTTP adapters against the configured backend.
    pub fn connect(config: BackendConfig, storage: Arc<dyn KeyValueStorage>) -> Result<Self, AuthError> {
        let client = ApiClient::new(&config.api_url, &config.api_key, config.request_timeout)?;
        let provider = HttpIdentityProvider::new(client.clone())
            .with_session_storage(Arc::clone(&storage), config.session_storage_key.clone());
        let profiles = HttpProfileStore::new(client);

        tracing::info!(api_url = %config.api_url, "Auth context connected");
        Ok(Self::new(config, storage, Arc::new(provider), Arc::new(profiles)))
    }

    /// Same-origin backend, `localStorage` persistence
    #[cfg(target_arch = "wasm32")]
    pub fn for_browser(api_key: &str) -> Result<Self, AuthError> {
        let storage = Arc::new(crate::storage::WebStorage::new());
        Self::connect(BackendConfig::from_window(api_key), storage)
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn store(&self) -> &AuthStateStore {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    pub fn snapshot(&self) -> AuthState {
        self.store.snapshot()
    }

    pub async fn bootstrap(&self) -> BootstrapOutcome {
        SessionBootstrap::new(
            Arc::clone(&self.provider),
            self.store.clone(),
            self.config.session_timeout,
        )
        .run()
        .await
    }

    pub fn attach_listener(&self) -> RemoteAuthEventListener {
        RemoteAuthEventListener::attach(
            self.provider.as_ref(),
            Arc::clone(&self.profiles),
            self.store.clone(),
            self.config.session_timeout,
        )
    }

    pub fn attach_cross_tab(&self) -> CrossTabSync {
        CrossTabSync::attach(self.store.clone())
    }

    pub fn provisioner(&self) -> ProfileProvisioner {
        ProfileProvisioner::new(
            Arc::clone(&self.profiles),
            self.config.provisioning,
            self.config.session_timeout,
        )
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthenticatedUser, AuthError> {
        actions::sign_in(self.provider.as_ref(), &self.store, email, password).await
    }

    pub async fn sign_up(
        &self,
        request: SignUpRequest,
        details: Option<RoleDetails>,
    ) -> Result<SignupOutcome, AuthError> {
        let provisioner = self.provisioner();
        actions::sign_up(self.provider.as_ref(), &self.store, &provisioner, request, details).await
    }

    pub async fn sign_out(&self) {
        self.store.sign_out(self.provider.as_ref()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test_support::{MockIdentityProvider, MockProfileStore};

    fn context(storage: MemoryStorage, provider: &Arc<MockIdentityProvider>) -> AuthContext {
        AuthContext::new(
            BackendConfig::default(),
            Arc::new(storage),
            provider.clone(),
            Arc::new(MockProfileStore::default()),
        )
    }

    #[test]
    fn test_clones_share_one_store() {
        let provider = Arc::new(MockIdentityProvider::default());
        let ctx = context(MemoryStorage::new(), &provider);
        let other = context(MemoryStorage::new(), &provider);

        assert!(ctx == ctx.clone());
        assert!(ctx != other);
    }

    #[tokio::test]
    async fn test_two_tabs_follow_each_other() {
        let storage = MemoryStorage::new();
        let provider = Arc::new(MockIdentityProvider::default());
        let tab_a = context(storage.clone(), &provider);
        let tab_b = context(storage.open_tab(), &provider);

        assert_eq!(tab_a.bootstrap().await, BootstrapOutcome::SignedOut);
        assert_eq!(tab_b.bootstrap().await, BootstrapOutcome::SignedOut);
        let _sync_a = tab_a.attach_cross_tab();
        let _sync_b = tab_b.attach_cross_tab();

        tab_a.sign_in("reem@example.com", "oud2024!").await.unwrap();
        assert_eq!(tab_b.snapshot().user_id(), Some("u-signed-in"));

        tab_b.sign_out().await;
        assert!(!tab_a.snapshot().is_authenticated);
        assert!(!tab_b.snapshot().is_authenticated);
        assert_eq!(provider.sign_out_calls(), 1);
    }

    #[test]
    fn test_connect_builds_http_adapters() {
        let config = BackendConfig {
            api_url: "https://project.example.co/".into(),
            api_key: "anon".into(),
            ..BackendConfig::default()
        };
        let ctx = AuthContext::connect(config, Arc::new(MemoryStorage::new())).unwrap();
        assert!(!ctx.snapshot().is_initialized);
        assert_eq!(ctx.config().api_key, "anon");
    }
}
