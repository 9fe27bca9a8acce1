//! Dioxus integration: the context provider, the route guard and hooks

pub mod auth;
pub mod common;

pub use auth::{use_auth, use_auth_state, use_sign_out, AuthProvider, RequireAuth};
pub use common::LoadingSpinner;
