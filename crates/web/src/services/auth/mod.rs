//! Authentication service.
//!
//! The pipeline only talks to a [`CredentialStore`]: a username/password
//! strategy plus the principal ↔ session-token indirection. Two backends
//! implement it, [`PgCredentialStore`] for production and
//! [`MemoryCredentialStore`] for tests and local experiments.

mod error;
mod memory;

pub use error::AuthError;
pub use memory::MemoryCredentialStore;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tokio::sync::OnceCell;

use lantern_core::{UserId, Username};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::Principal;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash checked when the username is unknown, so that case costs the same
/// Argon2 verification as a wrong password.
static UNKNOWN_USER_HASH: OnceCell<SecretString> = OnceCell::const_new();

/// Account backend consulted by the authentication stage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Verify a username/password pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown user or a wrong
    /// password, `AuthError::InvalidUsername` for a malformed username, and
    /// backend errors otherwise.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthError>;

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the username is taken, and
    /// validation errors for a malformed username or weak password.
    async fn register(&self, username: &str, password: &str) -> Result<Principal, AuthError>;

    /// Compact token stored in the session to remember `principal`.
    fn serialize(&self, principal: &Principal) -> String {
        principal.id.to_string()
    }

    /// Look up the principal a session token refers to.
    ///
    /// Returns `Ok(None)` when the token is malformed or the account no longer
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend itself fails.
    async fn deserialize(&self, token: &str) -> Result<Option<Principal>, AuthError>;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve requests.
    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

// =============================================================================
// PostgreSQL backend
// =============================================================================

/// Credential store backed by the `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new store on top of a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let username = Username::parse(username)?;
        let Some(principal) = self.users().get_by_username(&username).await? else {
            return Err(reject_unknown_user(password).await);
        };

        verify_password(password, principal.password_hash()).await?;

        Ok(principal)
    }

    async fn register(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;
        let password_hash = hash_password(password).await?;

        self.users()
            .create(&username, password_hash.expose_secret())
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    async fn deserialize(&self, token: &str) -> Result<Option<Principal>, AuthError> {
        let Ok(id) = token.parse::<UserId>() else {
            return Ok(None);
        };
        Ok(self.users().get_by_id(id).await?)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(self.users().ping().await?)
    }
}

// =============================================================================
// Password Helpers
// =============================================================================

/// Check a new password against the minimum requirements.
pub(crate) fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id on the blocking pool.
pub(crate) async fn hash_password(password: &str) -> Result<SecretString, AuthError> {
    let password = password.to_owned();

    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| SecretString::from(hash.to_string()))
            .map_err(|_| AuthError::PasswordHash)
    })
    .await
    .map_err(|_| AuthError::PasswordHash)?
}

/// Spend one password verification on an unknown username, then reject it.
pub(crate) async fn reject_unknown_user(password: &str) -> AuthError {
    match UNKNOWN_USER_HASH
        .get_or_try_init(|| hash_password("unknown-user-placeholder"))
        .await
    {
        Ok(hash) => {
            let _ = verify_password(password, hash).await;
        }
        Err(e) => tracing::warn!(error = %e, "Could not build unknown-user hash"),
    }

    AuthError::InvalidCredentials
}

/// Verify a password against a stored hash on the blocking pool.
pub(crate) async fn verify_password(password: &str, hash: &SecretString) -> Result<(), AuthError> {
    let password = password.to_owned();
    let hash = hash.clone();

    tokio::task::spawn_blocking(move || {
        let parsed_hash =
            PasswordHash::new(hash.expose_secret()).map_err(|_| AuthError::InvalidCredentials)?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    })
    .await
    .map_err(|_| AuthError::PasswordHash)?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_length() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("long enough").is_ok());
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("correct horse").await.unwrap();
        assert!(hash.expose_secret().starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).await.is_ok());
        assert!(matches!(
            verify_password("battery staple", &hash).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_is_checked_against_real_hash() {
        let err = reject_unknown_user("whatever-password").await;
        assert!(matches!(err, AuthError::InvalidCredentials));

        let hash = UNKNOWN_USER_HASH.get().unwrap();
        assert!(hash.expose_secret().starts_with("$argon2id$"));
        // Same parameters as real account hashes
        assert!(hash.expose_secret().contains("m=19456,t=2,p=1"));
    }

    #[tokio::test]
    async fn test_verify_rejects_malformed_hash() {
        let hash = SecretString::from("not-a-phc-string");
        assert!(matches!(
            verify_password("anything", &hash).await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
