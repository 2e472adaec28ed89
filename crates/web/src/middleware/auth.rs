//! Authentication resolution (pipeline stage 4) and extractors.
//!
//! The session only ever holds the principal's token; the account itself is
//! looked up through the [`CredentialStore`] on every request.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Method, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::{self, AppError};
use crate::middleware::flash::Flash;
use crate::middleware::session::session_of;
use crate::models::{Principal, session_keys};
use crate::services::{AuthError, CredentialStore};
use crate::state::AppState;

/// The principal resolved for this request, if any.
///
/// Inserted by [`resolve_principal`]; extracting it never fails.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Stage 4: restore the logged-in principal from the session.
///
/// A token whose account no longer exists is dropped from the session and the
/// request continues unauthenticated.
///
/// # Errors
///
/// Returns an error if the session or the credential store fails.
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = session_of(&request)?;

    let principal = match session.get::<String>(session_keys::USER_TOKEN).await? {
        Some(token) => {
            let principal = state.credentials().deserialize(&token).await?;
            if principal.is_none() {
                tracing::info!(token = %token, "Session refers to a missing account, logging out");
                session.remove::<String>(session_keys::USER_TOKEN).await?;
            }
            principal
        }
        None => None,
    };

    if let Some(principal) = &principal {
        error::set_sentry_user(&principal.id, principal.username.as_str());
    }

    request.extensions_mut().insert(CurrentUser(principal));
    Ok(next.run(request).await)
}

/// Extractor that requires a logged-in principal.
///
/// Otherwise it remembers the requested path (for `GET`s), flashes a notice,
/// and redirects to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub Principal);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(CurrentUser(Some(principal))) = parts.extensions.get::<CurrentUser>().cloned() {
            return Ok(Self(principal));
        }

        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| {
                AppError::Internal("session layer is not installed".to_string()).into_response()
            })?;

        if parts.method == Method::GET {
            let return_to = parts
                .uri
                .path_and_query()
                .map_or("/", |pq| pq.as_str())
                .to_string();
            session
                .insert(session_keys::RETURN_TO, return_to)
                .await
                .map_err(|e| AppError::from(e).into_response())?;
        }

        Flash::new(session)
            .error("You must be signed in first!")
            .await
            .map_err(|e| AppError::from(e).into_response())?;

        Err(Redirect::to("/login").into_response())
    }
}

/// Bind `principal` to the session.
///
/// The session ID is rotated so a pre-login cookie cannot be reused;
/// everything else in the record, including queued flash messages, carries
/// over to the new ID.
///
/// # Errors
///
/// Returns `AuthError::Session` if the session cannot be modified.
pub async fn start_session(
    session: &Session,
    credentials: &dyn CredentialStore,
    principal: &Principal,
) -> Result<(), AuthError> {
    session.cycle_id().await?;
    session
        .insert(session_keys::USER_TOKEN, credentials.serialize(principal))
        .await?;
    error::set_sentry_user(&principal.id, principal.username.as_str());
    Ok(())
}

/// Verify credentials and, on success, log the principal in.
///
/// A rejected login leaves the session untouched.
///
/// # Errors
///
/// Returns the strategy's error (see [`AuthError::is_rejected_credentials`])
/// or `AuthError::Session` if the session cannot be modified.
pub async fn login(
    session: &Session,
    credentials: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<Principal, AuthError> {
    let principal = credentials.authenticate(username, password).await?;
    start_session(session, credentials, &principal).await?;
    Ok(principal)
}

/// Forget the logged-in principal.
///
/// # Errors
///
/// Returns `AuthError::Session` if the session cannot be modified.
pub async fn logout(session: &Session) -> Result<(), AuthError> {
    session.remove::<String>(session_keys::USER_TOKEN).await?;
    session.cycle_id().await?;
    error::clear_sentry_user();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::services::MemoryCredentialStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_login_stores_token() {
        let store = MemoryCredentialStore::new();
        let registered = store.register("ada", "analytical-engine").await.unwrap();
        let session = session();

        let principal = login(&session, &store, "ada", "analytical-engine")
            .await
            .unwrap();
        assert_eq!(principal, registered);

        let token: Option<String> = session.get(session_keys::USER_TOKEN).await.unwrap();
        assert_eq!(token, Some(registered.id.to_string()));
    }

    #[tokio::test]
    async fn test_failed_login_leaves_session_untouched() {
        let store = MemoryCredentialStore::new();
        store.register("ada", "analytical-engine").await.unwrap();
        let session = session();

        let err = login(&session, &store, "ada", "wrong-password")
            .await
            .unwrap_err();
        assert!(err.is_rejected_credentials());
        assert!(!session.is_modified());
        let token: Option<String> = session.get(session_keys::USER_TOKEN).await.unwrap();
        assert_eq!(token, None);
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_keeps_flash() {
        let store = MemoryCredentialStore::new();
        store.register("ada", "analytical-engine").await.unwrap();
        let session = session();
        login(&session, &store, "ada", "analytical-engine")
            .await
            .unwrap();
        Flash::new(session.clone()).success("queued").await.unwrap();

        logout(&session).await.unwrap();

        let token: Option<String> = session.get(session_keys::USER_TOKEN).await.unwrap();
        assert_eq!(token, None);
        let queued = Flash::new(session)
            .drain(crate::middleware::FlashCategory::Success)
            .await
            .unwrap();
        assert_eq!(queued, vec!["queued".to_string()]);
    }
}
