//! Domain models for the web crate.
//!
//! - [`user`] - The authenticated principal
//! - [`session`] - Keys for values kept in the session record

pub mod session;
pub mod user;

pub use session::keys as session_keys;
pub use user::Principal;
