pub mod profile;
pub mod session;
pub mod user;

pub use profile::*;
pub use session::*;
pub use user::*;
