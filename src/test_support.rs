//! In-memory doubles for the remote collaborators

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::{IdentityProvider, ProfileStore, SignUpResponse};
use crate::error::AuthError;
use crate::models::{
    AuthEvent, AuthenticatedUser, ProfilePatch, ProfileRecord, Session, SessionUser, SignUpRequest,
    UserMetadata,
};
use crate::observer::{Handler, HandlerRegistry, Subscription};
use crate::state::AuthStateStore;
use crate::storage::{MemoryStorage, PersistentUserCache};

pub const USER_KEY: &str = "marketplace.auth.user";
pub const LEGACY_KEY: &str = "user";

pub fn init_logging() {
    let _ = crate::telemetry::init_tracing();
}

/// Store for one tab over `storage`
pub fn tab_store(storage: &MemoryStorage) -> AuthStateStore {
    let cache = PersistentUserCache::new(Arc::new(storage.clone()), USER_KEY, LEGACY_KEY);
    AuthStateStore::new(cache)
}

pub fn session_for(id: &str, email: &str, metadata: UserMetadata) -> Session {
    Session {
        access_token: format!("token-{id}"),
        refresh_token: Some(format!("refresh-{id}")),
        expires_at: None,
        user: SessionUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            phone: None,
            user_metadata: metadata,
            email_confirmed_at: Some(chrono::Utc::now()),
            phone_confirmed_at: None,
        },
    }
}

pub fn verified_user(id: &str) -> AuthenticatedUser {
    let mut user = AuthenticatedUser::new(id, format!("{id}@example.com"), "Maha Al-Harbi");
    user.is_verified = true;
    user
}

/// Scripted identity provider
#[derive(Default)]
pub struct MockIdentityProvider {
    session: Mutex<Option<Session>>,
    session_error: Mutex<Option<AuthError>>,
    session_delay: Mutex<Option<Duration>>,
    hang_session: AtomicBool,
    sign_in_error: Mutex<Option<AuthError>>,
    sign_up_error: Mutex<Option<AuthError>>,
    confirm_email_on_sign_up: AtomicBool,
    sign_out_error: Mutex<Option<AuthError>>,
    sign_out_calls: AtomicU32,
    events: HandlerRegistry<AuthEvent>,
}

impl MockIdentityProvider {
    pub fn with_session(session: Session) -> Self {
        let provider = Self::default();
        *provider.session.lock() = Some(session);
        provider
    }

    pub fn fail_session_lookup(&self, err: AuthError) {
        *self.session_error.lock() = Some(err);
    }

    pub fn delay_session_lookup(&self, delay: Duration) {
        *self.session_delay.lock() = Some(delay);
    }

    pub fn hang_session_lookup(&self) {
        self.hang_session.store(true, Ordering::SeqCst);
    }

    pub fn fail_sign_in(&self, err: AuthError) {
        *self.sign_in_error.lock() = Some(err);
    }

    pub fn fail_sign_up(&self, err: AuthError) {
        *self.sign_up_error.lock() = Some(err);
    }

    pub fn require_email_confirmation(&self) {
        self.confirm_email_on_sign_up.store(true, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self, err: AuthError) {
        *self.sign_out_error.lock() = Some(err);
    }

    pub fn sign_out_calls(&self) -> u32 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.len()
    }

    pub fn emit(&self, event: AuthEvent) {
        self.events.emit(&event);
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        if self.hang_session.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        let delay = *self.session_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.session_error.lock().clone() {
            return Err(err);
        }
        Ok(self.session.lock().clone())
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<Session, AuthError> {
        if let Some(err) = self.sign_in_error.lock().clone() {
            return Err(err);
        }
        let session = session_for("u-signed-in", email, UserMetadata::default());
        *self.session.lock() = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse, AuthError> {
        if let Some(err) = self.sign_up_error.lock().clone() {
            return Err(err);
        }
        let mut session = session_for("u-new", &request.email, request.metadata.clone());
        if self.confirm_email_on_sign_up.load(Ordering::SeqCst) {
            session.user.email_confirmed_at = None;
            return Ok(SignUpResponse {
                user: session.user,
                session: None,
            });
        }
        *self.session.lock() = Some(session.clone());
        Ok(SignUpResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock() = None;
        match self.sign_out_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn subscribe(&self, handler: Handler<AuthEvent>) -> Subscription {
        self.events.subscribe(handler)
    }
}

/// Profile table with injectable failures
#[derive(Default)]
pub struct MockProfileStore {
    rows: Mutex<HashMap<String, ProfileRecord>>,
    policy_failures: AtomicU32,
    write_error: Mutex<Option<AuthError>>,
    read_error: Mutex<Option<AuthError>>,
    hang_reads: AtomicBool,
    write_times: Mutex<Vec<tokio::time::Instant>>,
    insert_calls: AtomicU32,
}

impl MockProfileStore {
    pub fn with_row(record: ProfileRecord) -> Self {
        let store = Self::default();
        store.rows.lock().insert(record.id.clone(), record);
        store
    }

    /// Reject the next `count` writes with the policy code.
    pub fn fail_writes_with_policy(&self, count: u32) {
        self.policy_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_writes_with(&self, err: AuthError) {
        *self.write_error.lock() = Some(err);
    }

    pub fn fail_reads_with(&self, err: AuthError) {
        *self.read_error.lock() = Some(err);
    }

    pub fn hang_reads(&self, hang: bool) {
        self.hang_reads.store(hang, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn row(&self, id: &str) -> Option<ProfileRecord> {
        self.rows.lock().get(id).cloned()
    }

    pub fn insert_calls(&self) -> u32 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn write_times(&self) -> Vec<tokio::time::Instant> {
        self.write_times.lock().clone()
    }

    fn check_write(&self) -> Result<(), AuthError> {
        self.write_times.lock().push(tokio::time::Instant::now());
        if let Some(err) = self.write_error.lock().clone() {
            return Err(err);
        }
        let remaining = self.policy_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.policy_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AuthError::from_provider(
                403,
                Some(crate::error::POLICY_VIOLATION_CODE),
                "new row violates row-level security policy for table \"profiles\"",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn get_profile_by_user_id(&self, id: &str) -> Result<Option<ProfileRecord>, AuthError> {
        if self.hang_reads.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if let Some(err) = self.read_error.lock().clone() {
            return Err(err);
        }
        Ok(self.rows.lock().get(id).cloned())
    }

    async fn insert_profile(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;
        let mut rows = self.rows.lock();
        if rows.contains_key(&record.id) {
            return Err(AuthError::Unknown("duplicate key value violates unique constraint".into()));
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), AuthError> {
        self.check_write()?;
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get_mut(id) {
            if let Some(name) = &patch.full_name {
                row.full_name = name.clone();
            }
            if let Some(email) = &patch.email {
                row.email = email.clone();
            }
            if let Some(role) = patch.role {
                row.role = role;
            }
            if patch.details.is_some() {
                row.details = patch.details.clone();
            }
            if patch.location.is_some() {
                row.location = patch.location.clone();
            }
        }
        Ok(())
    }
}
