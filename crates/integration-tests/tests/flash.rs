//! Integration tests for flash messages.
//!
//! A notice queued while handling one request is shown by the next request
//! that renders, and by no request after that.

#![allow(clippy::unwrap_used)]

use axum::{Router, routing::get};
use lantern_integration_tests::TestServer;
use lantern_web::config::SessionSettings;
use lantern_web::error::{AppError, DEFAULT_ERROR_MESSAGE};
use reqwest::StatusCode;

async fn failing_route() -> Result<&'static str, AppError> {
    Err(AppError::Internal("storage offline".to_string()))
}

#[tokio::test]
async fn test_flash_is_shown_exactly_once() {
    let server = TestServer::start().await;
    server.create_user("ada").await;
    let client = server.client();

    // A: queue a notice
    server.login(&client, "ada", "definitely-wrong").await;

    // B: the notice is rendered
    let (status, body) = server.get_page(&client, "/login").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.matches("Password or username is incorrect").count(), 1);

    // C: and gone
    let (_, body) = server.get_page(&client, "/login").await;
    assert!(!body.contains("Password or username is incorrect"));
}

#[tokio::test]
async fn test_notices_queue_in_order() {
    let server = TestServer::start().await;
    server.create_user("ada").await;
    let client = server.client();

    server.login(&client, "ada", "wrong-once").await;
    server.login(&client, "nobody", "wrong-twice").await;

    let (_, body) = server.get_page(&client, "/login").await;
    assert_eq!(body.matches("Password or username is incorrect").count(), 2);
}

#[tokio::test]
async fn test_flash_is_per_client() {
    let server = TestServer::start().await;
    let alice = server.client();
    let bob = server.client();

    server.login(&alice, "nobody", "whatever-pass").await;

    let (_, body) = server.get_page(&bob, "/login").await;
    assert!(!body.contains("Password or username is incorrect"));

    let (_, body) = server.get_page(&alice, "/login").await;
    assert!(body.contains("Password or username is incorrect"));
}

#[tokio::test]
async fn test_flash_survives_an_error_page() {
    let server = TestServer::start().await;
    let client = server.client();

    server.register(&client, "wanderer").await;

    // The error page renders the queued notice like any other page
    let (status, body) = server.get_page(&client, "/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Welcome to Lantern!"));

    let (_, body) = server.get_page(&client, "/").await;
    assert!(!body.contains("Welcome to Lantern!"));
}

#[tokio::test]
async fn test_flash_shown_on_server_error_is_not_repeated() {
    let extra = Router::new().route("/boom", get(failing_route));
    let server = TestServer::start_with(extra, SessionSettings::default()).await;
    let client = server.client();

    server.register(&client, "unlucky").await;

    let (status, body) = server.get_page(&client, "/boom").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains(DEFAULT_ERROR_MESSAGE));
    assert_eq!(body.matches("Welcome to Lantern!").count(), 1);

    let (_, body) = server.get_page(&client, "/").await;
    assert!(!body.contains("Welcome to Lantern!"));
    // Still logged in: the failed request did not lose the session.
    assert!(body.contains("unlucky"));
}
