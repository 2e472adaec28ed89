//! Services behind the request pipeline.
//!
//! - `auth` - Credential stores: password verification and principal tokens

pub mod auth;

pub use auth::{AuthError, CredentialStore, MemoryCredentialStore, PgCredentialStore};
