//! Router assembly.
//!
//! [`build_router`] wires the pipeline stages around the static file service
//! and the route table. Layers added later wrap the ones added earlier, so
//! the chain below reads from the innermost stage outwards.

use std::any::Any;

use axum::{
    Router,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
};
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore, service::SignedCookie};
use tracing::field::Empty;

use crate::error::{AppError, NOT_FOUND_MESSAGE, normalize_errors};
use crate::middleware::{
    decode_form, method_override, park_failure_status, populate_render_context,
    request_id_middleware, resolve_principal, restore_failure_status, touch_session,
};
use crate::state::AppState;

/// Build the full application.
///
/// `routes` is the route table to dispatch into. Production passes
/// [`crate::routes::routes`]; tests may merge in extra handlers.
pub fn build_router<S>(
    state: AppState,
    session_layer: SessionManagerLayer<S, SignedCookie>,
    routes: Router<AppState>,
) -> Router
where
    S: SessionStore + Clone,
{
    let dispatch: Router = routes.fallback(not_found).with_state(state.clone());

    let assets = ServeDir::new(&state.config().public_dir)
        .append_index_html_on_directories(false)
        .call_fallback_on_method_not_allowed(true)
        .fallback(dispatch);

    Router::new()
        .fallback_service(assets)
        .layer(middleware::from_fn(populate_render_context))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_principal))
        .layer(middleware::from_fn_with_state(
            state.config().session,
            touch_session,
        ))
        .layer(middleware::from_fn(park_failure_status))
        .layer(session_layer)
        .layer(middleware::from_fn(restore_failure_status))
        .layer(middleware::from_fn(method_override))
        .layer(middleware::from_fn(decode_form))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(normalize_errors))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Final fallback when no route matched.
async fn not_found() -> AppError {
    AppError::NotFound(NOT_FOUND_MESSAGE.to_string())
}

/// Turn a handler panic into a plain 500 for the error normalizer.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{StatusCode, header},
    };
    use secrecy::SecretString;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::{AppConfig, SessionSettings};
    use crate::middleware::create_session_layer;
    use crate::services::MemoryCredentialStore;

    fn app() -> Router {
        let config = AppConfig {
            database_url: SecretString::from("postgres://unused"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            base_url: "http://localhost".to_string(),
            session_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            session: SessionSettings::default(),
            public_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public"),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let state = AppState::new(config, Arc::new(MemoryCredentialStore::new()));
        build_router(state, session_layer, crate::routes::routes())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_home_issues_session_cookie() {
        let response = app().oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("session="));
    }

    #[tokio::test]
    async fn test_unmatched_path_is_rendered_not_found() {
        let response = app().oneshot(get("/definitely/not/here")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains(NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_stylesheet_is_served_from_public_dir() {
        let response = app().oneshot(get("/css/app.css")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/css"));
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let response = app().oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
