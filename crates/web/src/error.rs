//! Unified error handling and the terminal error-normalizing stage.
//!
//! Handlers and pipeline stages return `Result<T, AppError>`. Converting an
//! `AppError` into a response yields a bare status with an [`ErrorContext`]
//! extension; [`normalize_errors`] turns that (or any other unhandled failure
//! response, such as an extractor rejection or a caught panic) into the
//! rendered error page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::filters;
use crate::middleware::RenderContext;
use crate::services::AuthError;

/// Message shown when a failure carries none of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "Oh No, Something Went Wrong!";

/// Message for requests that matched no route and no static file.
pub const NOT_FOUND_MESSAGE: &str = "Page Not Found";

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session record could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the configured limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Any other handler failure, with an optional status and message.
    #[error("Application error ({status}): {}", .message.as_deref().unwrap_or("<none>"))]
    Application {
        status: StatusCode,
        message: Option<String>,
    },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A failure with only a status code.
    #[must_use]
    pub const fn status(status: StatusCode) -> Self {
        Self::Application {
            status,
            message: None,
        }
    }

    /// A failure with a status code and a user-facing message.
    #[must_use]
    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Application {
            status,
            message: Some(message.into()),
        }
    }

    /// HTTP status for this failure.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidUsername(_) => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Session(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Application { status, .. } => *status,
        }
    }

    /// Message safe to show the client. `None` falls back to the default.
    fn public_message(&self) -> Option<String> {
        // Don't expose internal error details to clients
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => None,
            Self::Auth(err) => err.user_message(),
            Self::NotFound(msg) | Self::BadRequest(msg) => Some(msg.clone()),
            Self::PayloadTooLarge => Some("Payload Too Large".to_string()),
            Self::Application { message, .. } => message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request failed");
        }

        let mut response = status.into_response();
        response
            .extensions_mut()
            .insert(ErrorContext::new(status, self.public_message()));
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
///
/// Called whenever a principal is resolved or logged in, so errors are
/// associated with the account.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context (logout).
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

// =============================================================================
// Error Normalizer
// =============================================================================

/// Status and message of a failed request, as shown on the error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub status: StatusCode,
    pub message: String,
}

impl ErrorContext {
    /// Build a context, substituting the default message for a missing or
    /// blank one.
    #[must_use]
    pub fn new(status: StatusCode, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
        Self { status, message }
    }

    /// Context for a failure response that carries only a status.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        let message = match status {
            StatusCode::NOT_FOUND => Some(NOT_FOUND_MESSAGE.to_string()),
            s if s.is_client_error() => s.canonical_reason().map(str::to_string),
            _ => None,
        };
        Self::new(status, message)
    }

    /// Numeric status code for templates.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.status.as_u16()
    }
}

/// Generic error page.
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub ctx: RenderContext,
    pub err: ErrorContext,
}

/// Terminal stage: render every failure as the error page.
///
/// A response is a failure if it carries an [`ErrorContext`], or if it has an
/// error status and is not already an HTML page (extractor rejections,
/// `405`s from the router, caught panics). Headers set by inner stages, such
/// as `Set-Cookie`, are kept.
pub async fn normalize_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let err = match response.extensions().get::<ErrorContext>() {
        Some(err) => err.clone(),
        None if is_unhandled_failure(&response) => ErrorContext::from_status(response.status()),
        None => return response,
    };

    let ctx = response
        .extensions()
        .get::<RenderContext>()
        .cloned()
        .unwrap_or_default();

    let (parts, _body) = response.into_parts();
    let status = err.status;
    let mut rendered = (status, ErrorTemplate { ctx, err }).into_response();
    carry_headers(&parts.headers, rendered.headers_mut());
    rendered
}

fn is_unhandled_failure(response: &Response) -> bool {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return false;
    }

    !response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"))
}

fn carry_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            to.append(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("page".to_string());
        assert_eq!(err.to_string(), "Not found: page");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::PayloadTooLarge),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::status(StatusCode::IM_A_TEAPOT)),
            StatusCode::IM_A_TEAPOT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_attaches_context() {
        let response = AppError::with_message(StatusCode::FORBIDDEN, "No entry").into_response();
        let ctx = response.extensions().get::<ErrorContext>().cloned();
        assert_eq!(
            ctx,
            Some(ErrorContext {
                status: StatusCode::FORBIDDEN,
                message: "No entry".to_string(),
            })
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let response =
            AppError::Internal("connection refused at 10.0.0.3".to_string()).into_response();
        let ctx = response.extensions().get::<ErrorContext>().cloned();
        assert_eq!(
            ctx.map(|c| c.message),
            Some(DEFAULT_ERROR_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_error_context_defaults() {
        let ctx = ErrorContext::new(StatusCode::INTERNAL_SERVER_ERROR, None);
        assert_eq!(ctx.message, DEFAULT_ERROR_MESSAGE);
        assert_eq!(ctx.code(), 500);

        let blank = ErrorContext::new(StatusCode::BAD_REQUEST, Some("   ".to_string()));
        assert_eq!(blank.message, DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn test_error_context_from_status() {
        assert_eq!(
            ErrorContext::from_status(StatusCode::NOT_FOUND).message,
            NOT_FOUND_MESSAGE
        );
        assert_eq!(
            ErrorContext::from_status(StatusCode::METHOD_NOT_ALLOWED).message,
            "Method Not Allowed"
        );
        assert_eq!(
            ErrorContext::from_status(StatusCode::BAD_GATEWAY).message,
            DEFAULT_ERROR_MESSAGE
        );
    }
}
