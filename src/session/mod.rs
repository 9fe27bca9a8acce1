//! Session lifecycle
//!
//! - [`SessionBootstrap`]: one-time startup reconciliation
//! - [`LegacyMigration`]: pre-migration cache key shim used by bootstrap
//! - [`RemoteAuthEventListener`]: provider events into the store
//! - [`CrossTabSync`]: other tabs' cache writes into the store
//! - [`actions`]: interactive sign-in and sign-up

pub mod actions;
pub mod bootstrap;
pub mod listener;
pub mod migration;
pub mod sync;

pub use actions::{sign_in, sign_up, ProfileStatus, SignupOutcome};
pub use bootstrap::{BootstrapOutcome, SessionBootstrap};
pub use listener::RemoteAuthEventListener;
pub use migration::{LegacyMigration, MigrationOutcome};
pub use sync::CrossTabSync;
