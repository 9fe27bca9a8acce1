//! Remote collaborators
//!
//! The identity provider and the profile store are reached only through
//! the [`IdentityProvider`] and [`ProfileStore`] traits. The HTTP adapters
//! talk to the hosted backend; tests substitute in-memory doubles.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::models::{AuthEvent, ProfilePatch, ProfileRecord, Session, SessionUser, SignUpRequest};
use crate::observer::{Handler, Subscription};

pub mod auth;
pub mod client;
pub mod profiles;

pub use auth::HttpIdentityProvider;
pub use client::ApiClient;
pub use profiles::HttpProfileStore;

/// Result of a sign-up. `session` is absent when the provider requires
/// email confirmation before the first sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpResponse {
    pub user: SessionUser,
    pub session: Option<Session>,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait IdentityProvider: Send + Sync {
    /// The active session, if any. Fails on network trouble.
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Session change notifications, in emission order
    fn subscribe(&self, handler: Handler<AuthEvent>) -> Subscription;
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ProfileStore: Send + Sync {
    async fn get_profile_by_user_id(&self, id: &str) -> Result<Option<ProfileRecord>, AuthError>;

    async fn insert_profile(&self, record: &ProfileRecord) -> Result<(), AuthError>;

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), AuthError>;
}
