//! Integration tests for Lantern.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p lantern-integration-tests
//! ```
//!
//! Each test starts the full application on an ephemeral port, backed by
//! in-memory session and account stores, and drives it over HTTP.
//!
//! # Test Categories
//!
//! - `pipeline` - Session cookies, static assets, method override, errors
//! - `auth` - Registration, login, logout, protected pages
//! - `flash` - Single-delivery notices across redirects

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use lantern_web::config::{AppConfig, SessionSettings};
use lantern_web::middleware::create_session_layer;
use lantern_web::services::{CredentialStore, MemoryCredentialStore};
use lantern_web::state::AppState;
use reqwest::{Client, Response, header};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_sessions::MemoryStore;

/// Session secret used by every test server.
const TEST_SESSION_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

/// Password that satisfies the registration rules.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// A running application with in-memory backends.
pub struct TestServer {
    pub base_url: String,
    pub credentials: Arc<MemoryCredentialStore>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start the application with the production route table.
    pub async fn start() -> Self {
        Self::start_with(Router::new(), SessionSettings::default()).await
    }

    /// Start the application with `extra` routes merged into the production
    /// table and the given session policy.
    pub async fn start_with(extra: Router<AppState>, session: SessionSettings) -> Self {
        let config = test_config(session);
        let credentials = Arc::new(MemoryCredentialStore::new());
        let state = AppState::new(config.clone(), credentials.clone());

        let session_layer = create_session_layer(MemoryStore::default(), &config);
        let app = lantern_web::build_router(
            state,
            session_layer,
            lantern_web::routes::routes().merge(extra),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            credentials,
            handle,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A browser-like client: keeps cookies, does not follow redirects.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    /// A client without a cookie jar, for tests that manage cookies by hand.
    #[must_use]
    pub fn bare_client(&self) -> Client {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Create an account directly in the store.
    pub async fn create_user(&self, username: &str) {
        self.credentials
            .register(username, TEST_PASSWORD)
            .await
            .expect("Failed to create test user");
    }

    /// Register `username` through the form, leaving `client` logged in.
    pub async fn register(&self, client: &Client, username: &str) -> Response {
        client
            .post(self.url("/register"))
            .form(&[("username", username), ("password", TEST_PASSWORD)])
            .send()
            .await
            .expect("Register request failed")
    }

    /// Submit the login form.
    pub async fn login(&self, client: &Client, username: &str, password: &str) -> Response {
        client
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .expect("Login request failed")
    }

    /// Log out through the method-override form.
    pub async fn logout(&self, client: &Client) -> Response {
        client
            .post(self.url("/logout"))
            .form(&[("_method", "DELETE")])
            .send()
            .await
            .expect("Logout request failed")
    }

    /// GET `path` and return the status and body.
    pub async fn get_page(&self, client: &Client, path: &str) -> (reqwest::StatusCode, String) {
        let resp = client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed");
        let status = resp.status();
        let body = resp.text().await.expect("Failed to read body");
        (status, body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Every `Set-Cookie` header on `resp` that sets the session cookie.
#[must_use]
pub fn session_cookies(resp: &Response) -> Vec<String> {
    let prefix = format!("{}=", lantern_web::middleware::SESSION_COOKIE_NAME);
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}

/// The `name=value` pair of a `Set-Cookie` header, ready for a `Cookie` header.
#[must_use]
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(resp: &Response) -> Option<String> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn test_config(session: SessionSettings) -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://unused"),
        host: "127.0.0.1".parse().expect("valid address"),
        port: 0,
        base_url: "http://localhost".to_string(),
        session_secret: SecretString::from(TEST_SESSION_SECRET),
        session,
        public_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../web/public"),
        sentry_dsn: None,
        sentry_environment: None,
    }
}
