//! Business profile provisioning after signup
//!
//! Right after an identity is created, the data store's access policy may
//! not yet recognise it and rejects writes with the policy code. Those
//! rejections are retried with a growing delay; anything else stops at once.
//! Every attempt re-checks whether the profile exists, so a second call for
//! the same user updates instead of inserting a duplicate.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::api::ProfileStore;
use crate::error::AuthError;
use crate::models::{ProfilePatch, ProfileRecord};
use crate::platform::{sleep, timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub action: ProvisionAction,
    pub attempts: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// The account exists; only the profile is pending. Safe to retry later.
    #[error("Profile permissions still propagating after {attempts} attempts: {message}")]
    PolicyPending { attempts: u32, message: String },

    #[error("Profile provisioning failed: {0}")]
    Failed(AuthError),
}

impl ProvisionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisionError::PolicyPending { .. })
    }
}

#[derive(Clone)]
pub struct ProfileProvisioner {
    store: Arc<dyn ProfileStore>,
    policy: RetryPolicy,
    read_timeout: Duration,
}

impl ProfileProvisioner {
    pub fn new(store: Arc<dyn ProfileStore>, policy: RetryPolicy, read_timeout: Duration) -> Self {
        Self {
            store,
            policy,
            read_timeout,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Create or update the profile for `record.id`.
    pub async fn provision(&self, record: &ProfileRecord) -> Result<ProvisionOutcome, ProvisionError> {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.create_or_update(record).await {
                Ok(action) => {
                    tracing::info!(user_id = %record.id, attempt, ?action, "Profile provisioned");
                    return Ok(ProvisionOutcome {
                        action,
                        attempts: attempt,
                    });
                }
                Err(AuthError::Policy(message)) if attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        user_id = %record.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Profile write not yet permitted, retrying: {}",
                        message
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(AuthError::Policy(message)) => {
                    tracing::warn!(
                        user_id = %record.id,
                        attempts = attempt,
                        "Profile write still not permitted, giving up for now"
                    );
                    return Err(ProvisionError::PolicyPending {
                        attempts: attempt,
                        message,
                    });
                }
                Err(e) => {
                    tracing::error!(user_id = %record.id, attempt, "Profile provisioning failed: {}", e);
                    return Err(ProvisionError::Failed(e));
                }
            }
        }
    }

    async fn create_or_update(&self, record: &ProfileRecord) -> Result<ProvisionAction, AuthError> {
        let existing = timeout(self.read_timeout, self.store.get_profile_by_user_id(&record.id))
            .await
            .map_err(|elapsed| AuthError::Network(format!("Profile lookup {elapsed}")))??;

        match existing {
            Some(_) => {
                self.store
                    .update_profile(&record.id, &ProfilePatch::from(record))
                    .await?;
                Ok(ProvisionAction::Updated)
            }
            None => {
                self.store.insert_profile(record).await?;
                Ok(ProvisionAction::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthenticatedUser, RoleDetails, UserRole};
    use crate::test_support::MockProfileStore;

    fn record(id: &str) -> ProfileRecord {
        let mut user = AuthenticatedUser::new(id, "vendor@example.com", "Faisal Store");
        user.role = UserRole::Vendor;
        ProfileRecord::for_user(&user)
    }

    fn provisioner(store: &Arc<MockProfileStore>) -> ProfileProvisioner {
        ProfileProvisioner::new(store.clone(), RetryPolicy::default(), Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_inserts_when_missing() {
        let store = Arc::new(MockProfileStore::default());
        let outcome = provisioner(&store).provision(&record("u1")).await.unwrap();

        assert_eq!(outcome, ProvisionOutcome { action: ProvisionAction::Created, attempts: 1 });
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_updates_instead_of_duplicating() {
        let store = Arc::new(MockProfileStore::default());
        let provisioner = provisioner(&store);

        provisioner.provision(&record("u1")).await.unwrap();
        let mut changed = record("u1");
        changed.details = Some(RoleDetails::Vendor {
            store_name: "Faisal Oud".into(),
            categories: vec!["perfume".into()],
            commercial_registration: None,
        });
        let outcome = provisioner.provision(&changed).await.unwrap();

        assert_eq!(outcome.action, ProvisionAction::Updated);
        assert_eq!(store.row_count(), 1);
        assert_eq!(store.insert_calls(), 1);
        assert!(store.row("u1").unwrap().details.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_errors_exhaust_retries_with_growing_delays() {
        let store = Arc::new(MockProfileStore::default());
        store.fail_writes_with_policy(u32::MAX);

        let err = provisioner(&store).provision(&record("u1")).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(err, ProvisionError::PolicyPending { attempts: 3, .. }));
        let times = store.write_times();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_secs(1));
        assert!(second_gap >= Duration::from_secs(2));
        assert!(second_gap > first_gap);
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_once_policy_propagates() {
        let store = Arc::new(MockProfileStore::default());
        store.fail_writes_with_policy(1);

        let outcome = provisioner(&store).provision(&record("u1")).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome { action: ProvisionAction::Created, attempts: 2 });
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_stop_immediately() {
        let store = Arc::new(MockProfileStore::default());
        store.fail_writes_with(AuthError::Validation("role is not allowed".into()));

        let err = provisioner(&store).provision(&record("u1")).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, ProvisionError::Failed(AuthError::Validation(_))));
        assert_eq!(store.write_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_lookup_times_out() {
        let store = Arc::new(MockProfileStore::default());
        store.hang_reads(true);

        let err = provisioner(&store).provision(&record("u1")).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Failed(AuthError::Network(_))));
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn test_delay_grows_with_attempt() {
        let policy = RetryPolicy { max_retries: 4, base_delay: Duration::from_millis(500) };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1500));
    }
}
