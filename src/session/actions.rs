//! Interactive sign-in and sign-up
//!
//! Both run client-side validation before any remote call and end in
//! `login` on success. A sign-up whose business profile could not be
//! written still logs the user in; the caller gets the profile status.

use crate::api::IdentityProvider;
use crate::error::AuthError;
use crate::models::{AuthenticatedUser, ProfileRecord, RoleDetails, SignUpRequest};
use crate::provisioning::{ProfileProvisioner, ProvisionError, ProvisionOutcome};
use crate::state::AuthStateStore;

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileStatus {
    Provisioned(ProvisionOutcome),
    /// Access policy has not caught up with the new account yet; retry later.
    Pending(ProvisionError),
    /// The write was rejected for another reason.
    Failed(ProvisionError),
    /// Email confirmation comes first. Hand the record to
    /// [`ProfileProvisioner::provision`] after the first confirmed sign-in.
    Deferred(ProfileRecord),
}

impl From<Result<ProvisionOutcome, ProvisionError>> for ProfileStatus {
    fn from(result: Result<ProvisionOutcome, ProvisionError>) -> Self {
        match result {
            Ok(outcome) => Self::Provisioned(outcome),
            Err(e) if e.is_retryable() => Self::Pending(e),
            Err(e) => Self::Failed(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignupOutcome {
    pub user: AuthenticatedUser,
    pub profile: ProfileStatus,
    /// No session yet; the user has to confirm their email first
    pub requires_confirmation: bool,
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AuthError::Validation("Please enter a valid email address".into()))
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < 8 {
        return Err(AuthError::Validation("Password must be at least 8 characters".into()));
    }
    if !password.chars().any(|c| c.is_numeric()) {
        return Err(AuthError::Validation("Password must contain at least one number".into()));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(AuthError::Validation("Password must contain at least one letter".into()));
    }
    Ok(())
}

pub async fn sign_in(
    provider: &dyn IdentityProvider,
    store: &AuthStateStore,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AuthError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(AuthError::Validation("Please enter your password".into()));
    }

    store.set_loading(true);
    match provider.sign_in_with_password(email.trim(), password).await {
        Ok(session) => {
            let user = session.user.minimal_user();
            store.login(user.clone());
            Ok(user)
        }
        Err(e) => {
            tracing::warn!("Sign-in failed: {}", e);
            store.set_loading(false);
            Err(e)
        }
    }
}

/// Create the identity, provision its profile, and log in.
///
/// `details` carries the role-specific part of the profile (store name for
/// vendors, saved addresses for customers).
pub async fn sign_up(
    provider: &dyn IdentityProvider,
    store: &AuthStateStore,
    provisioner: &ProfileProvisioner,
    request: SignUpRequest,
    details: Option<RoleDetails>,
) -> Result<SignupOutcome, AuthError> {
    validate_email(&request.email)?;
    validate_password(&request.password)?;

    let request = SignUpRequest {
        email: request.email.trim().to_string(),
        ..request
    };

    store.set_loading(true);
    let response = match provider.sign_up(&request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Sign-up failed: {}", e);
            store.set_loading(false);
            return Err(e);
        }
    };

    let user = response.user.minimal_user();
    let mut record = ProfileRecord::for_user(&user);
    record.details = details;

    // without a session only the anonymous key is sent, which the row policy rejects
    let requires_confirmation = response.session.is_none();
    let profile = if requires_confirmation {
        tracing::info!(user_id = %user.id, "Account created, awaiting email confirmation");
        store.set_loading(false);
        ProfileStatus::Deferred(record)
    } else {
        let profile = ProfileStatus::from(provisioner.provision(&record).await);
        store.login(user.clone());
        if matches!(profile, ProfileStatus::Provisioned(_)) {
            let _ = store.set_profile(Some(record.overlay(&user)));
        }
        profile
    };

    Ok(SignupOutcome {
        user,
        profile,
        requires_confirmation,
    })
}
