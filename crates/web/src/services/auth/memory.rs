//! In-memory credential store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use lantern_core::{UserId, Username};

use super::{
    AuthError, CredentialStore, hash_password, reject_unknown_user, validate_password,
    verify_password,
};
use crate::models::Principal;

/// Credential store that keeps accounts in process memory.
///
/// Accounts are lost on restart. IDs are assigned sequentially from 1.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<UserId, Principal>>,
    next_id: AtomicI64,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an account, as if it had been deleted out from under its sessions.
    pub async fn remove(&self, id: UserId) -> Option<Principal> {
        self.users.write().await.remove(&id)
    }

    async fn find_by_username(&self, username: &Username) -> Option<Principal> {
        self.users
            .read()
            .await
            .values()
            .find(|p| &p.username == username)
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let username = Username::parse(username)?;
        let Some(principal) = self.find_by_username(&username).await else {
            return Err(reject_unknown_user(password).await);
        };

        verify_password(password, principal.password_hash()).await?;

        Ok(principal)
    }

    async fn register(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;
        let password_hash = hash_password(password).await?;

        let mut users = self.users.write().await;
        if users.values().any(|p| p.username == username) {
            return Err(AuthError::UserAlreadyExists);
        }

        let id = UserId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let principal = Principal::new(id, username, password_hash);
        users.insert(id, principal.clone());

        Ok(principal)
    }

    async fn deserialize(&self, token: &str) -> Result<Option<Principal>, AuthError> {
        let Ok(id) = token.parse::<UserId>() else {
            return Ok(None);
        };
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let store = MemoryCredentialStore::new();
        let registered = store.register("ada", "analytical-engine").await.unwrap();
        assert_eq!(registered.id, UserId::new(1));

        let authenticated = store.authenticate("ada", "analytical-engine").await.unwrap();
        assert_eq!(authenticated, registered);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_bad_credentials() {
        let store = MemoryCredentialStore::new();
        store.register("ada", "analytical-engine").await.unwrap();

        assert!(matches!(
            store.authenticate("ada", "difference-engine").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            store.authenticate("grace", "analytical-engine").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_runs_password_verification() {
        let store = MemoryCredentialStore::new();

        assert!(matches!(
            store.authenticate("nobody", "analytical-engine").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(super::super::UNKNOWN_USER_HASH.initialized());
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let store = MemoryCredentialStore::new();
        store.register("ada", "analytical-engine").await.unwrap();
        assert!(matches!(
            store.register("ada", "another-password").await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_serialize_deserialize() {
        let store = MemoryCredentialStore::new();
        let principal = store.register("ada", "analytical-engine").await.unwrap();

        let token = store.serialize(&principal);
        assert_eq!(token, "1");
        assert_eq!(store.deserialize(&token).await.unwrap(), Some(principal));
    }

    #[tokio::test]
    async fn test_deserialize_unknown_or_malformed_token() {
        let store = MemoryCredentialStore::new();
        let principal = store.register("ada", "analytical-engine").await.unwrap();
        store.remove(principal.id).await;

        assert_eq!(store.deserialize("1").await.unwrap(), None);
        assert_eq!(store.deserialize("garbage").await.unwrap(), None);
    }
}
