//! Marketplace session engine
//!
//! Client-side authentication state for the marketplace web front end.
//! Reconciles the remote identity provider's session, the locally cached
//! user and other open tabs into one observable "current user" state.
//!
//! The pieces, leaves first:
//! - [`storage`]: key-value storage backends and the persistent user cache
//! - [`models`]: user, profile and session records plus normalization
//! - [`state`]: the in-memory auth state store
//! - [`session`]: bootstrap, remote event listener, cross-tab sync, sign-in/up
//! - [`provisioning`]: retrying create-or-update of the business profile
//! - [`api`]: identity provider and profile store seams with HTTP adapters
//! - [`components`]: Dioxus provider and route guard

pub mod api;
pub mod components;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod observer;
pub mod platform;
pub mod provisioning;
pub mod session;
pub mod state;
pub mod storage;

#[cfg(not(target_arch = "wasm32"))]
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::BackendConfig;
pub use context::AuthContext;
pub use error::AuthError;
pub use models::{AuthenticatedUser, UserOrigin, UserProfile, UserRole};
pub use state::{AuthState, AuthStateStore};
