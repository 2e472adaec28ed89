//! User account route handlers: registration, login, and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::Result;
use crate::filters;
use crate::middleware::{self, Flash, RenderContext};
use crate::models::session_keys;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub ctx: RenderContext,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "users/register.html")]
pub struct RegisterTemplate {
    pub ctx: RenderContext,
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(ctx: RenderContext) -> impl IntoResponse {
    RegisterTemplate { ctx }
}

/// Handle registration form submission.
///
/// A new account is logged in straight away. Validation failures and taken
/// usernames are flashed back to the registration page.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    flash: Flash,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let credentials = state.credentials();

    let principal = match credentials.register(&form.username, &form.password).await {
        Ok(principal) => principal,
        Err(e) => {
            let Some(message) = e.user_message() else {
                return Err(e.into());
            };
            tracing::info!(username = %form.username, error = %e, "Registration rejected");
            flash.error(message).await?;
            return Ok(Redirect::to("/register").into_response());
        }
    };

    middleware::start_session(&session, credentials, &principal).await?;
    tracing::info!(user_id = %principal.id, username = %principal.username, "User registered");

    flash.success("Welcome to Lantern!").await?;
    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: RenderContext) -> impl IntoResponse {
    LoginTemplate { ctx }
}

/// Handle login form submission.
///
/// On success the user lands on the page that sent them to login, if any.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    flash: Flash,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match middleware::login(&session, state.credentials(), &form.username, &form.password).await {
        Ok(principal) => {
            tracing::info!(user_id = %principal.id, "User logged in");
        }
        Err(e) if e.is_rejected_credentials() => {
            tracing::info!(username = %form.username, "Login failed");
            flash.error("Password or username is incorrect").await?;
            return Ok(Redirect::to("/login").into_response());
        }
        Err(e) => return Err(e.into()),
    }

    let return_to = session
        .remove::<String>(session_keys::RETURN_TO)
        .await?
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| "/".to_string());

    flash.success("Welcome back!").await?;
    Ok(Redirect::to(&return_to).into_response())
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
pub async fn logout(session: Session, flash: Flash) -> Result<Response> {
    middleware::logout(&session).await?;
    flash.success("Goodbye!").await?;
    Ok(Redirect::to("/").into_response())
}

/// Whether `path` stays on this site.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}
