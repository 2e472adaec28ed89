//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /                 - Home page
//! GET    /health           - Liveness check
//! GET    /health/ready     - Readiness check (credential store reachable)
//!
//! # Users
//! GET    /register         - Registration page
//! POST   /register         - Create an account and log in
//! GET    /login            - Login page
//! POST   /login            - Login action
//! DELETE /logout           - Logout action (POST with `_method=DELETE`)
//!
//! # Account (requires auth)
//! GET    /account          - Account overview
//! ```

pub mod account;
pub mod health;
pub mod home;
pub mod users;

use axum::{
    Router,
    routing::{delete, get},
};

use crate::state::AppState;

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(users::register_page).post(users::register))
        .route("/login", get(users::login_page).post(users::login))
        .route("/logout", delete(users::logout))
}

/// Create all routes for the site.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/account", get(account::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(user_routes())
}
