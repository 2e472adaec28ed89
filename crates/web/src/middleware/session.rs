//! Session resolution (pipeline stage 3).
//!
//! tower-sessions loads the record named by the signed `session` cookie. The
//! record expires `ttl_secs` after it was last saved (`Expiry::OnInactivity`)
//! and the store enforces that expiry on load. [`touch_session`] decides when
//! a request counts as activity worth saving: at most once per
//! `touch_after_secs`, and always for a client that has no record yet.
//!
//! tower-sessions never saves a session on a server-error response. Failures
//! still drain flash messages and still owe a new client its cookie, so
//! [`park_failure_status`] and [`restore_failure_status`] hide a 5xx status
//! from the session layer while it decides whether to save.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use tower_sessions::{
    Expiry, Session, SessionManagerLayer, SessionStore,
    cookie::{Key, SameSite, time::Duration},
    service::SignedCookie,
};

use crate::config::{AppConfig, SessionSettings};
use crate::error::AppError;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Create the session layer on top of any session store.
///
/// Production passes a `PostgresStore`; tests pass a `MemoryStore`.
#[must_use]
pub fn create_session_layer<S>(store: S, config: &AppConfig) -> SessionManagerLayer<S, SignedCookie>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            config.session.ttl_secs,
        )))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(&config.session_secret))
}

/// Derive the 64-byte cookie signing key from the configured secret.
fn signing_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Get the request's session, placed there by `SessionManagerLayer`.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session layer is not installed.
pub(crate) fn session_of(request: &Request) -> Result<Session, AppError> {
    request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))
}

/// Stage 3b: refresh the session record when it is due.
///
/// Writing the touch timestamp marks the session modified, which makes the
/// session layer save the record with a fresh expiry and re-issue the cookie.
/// New clients get a record and a cookie on their first response.
///
/// # Errors
///
/// Returns `AppError::Session` if the record cannot be loaded.
pub async fn touch_session(
    State(settings): State<SessionSettings>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = session_of(&request)?;
    let now = chrono::Utc::now().timestamp();
    let last_touched: Option<i64> = session.get(session_keys::TOUCHED_AT).await?;

    if needs_touch(last_touched, now, settings.touch_after_secs) {
        tracing::trace!(?last_touched, now, "Touching session");
        session.insert(session_keys::TOUCHED_AT, now).await?;
    }

    Ok(next.run(request).await)
}

/// Server-error status held back from the session layer.
#[derive(Debug, Clone, Copy)]
struct ParkedStatus(StatusCode);

/// Runs just inside the session layer: report a 5xx as `200 OK` so the
/// session is saved, remembering the real status.
pub async fn park_failure_status(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        response.extensions_mut().insert(ParkedStatus(status));
        *response.status_mut() = StatusCode::OK;
    }

    response
}

/// Runs just outside the session layer: put back a status parked by
/// [`park_failure_status`].
pub async fn restore_failure_status(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    if let Some(ParkedStatus(status)) = response.extensions_mut().remove::<ParkedStatus>() {
        *response.status_mut() = status;
    }

    response
}

fn needs_touch(last_touched: Option<i64>, now: i64, touch_after_secs: i64) -> bool {
    last_touched.is_none_or(|at| now.saturating_sub(at) >= touch_after_secs)
}
