//! User account management commands.
//!
//! # Usage
//!
//! ```bash
//! lantern-cli user create -u ada -p 'correct horse battery staple'
//! ```

use lantern_web::services::{CredentialStore, PgCredentialStore};

use super::{CommandError, connect};

/// Create a new user account.
///
/// Goes through the same validation and hashing as the registration page.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if the username is taken or invalid, the password is too
/// weak, or the database is unreachable.
pub async fn create_user(username: &str, password: &str) -> Result<i64, CommandError> {
    let pool = connect().await?;
    let store = PgCredentialStore::new(pool);

    tracing::info!("Creating user: {}", username);
    let principal = store.register(username, password).await?;

    Ok(principal.id.as_i64())
}
