//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::CredentialStore;

/// Application state shared across all handlers and pipeline stages.
///
/// Built once at start-up from explicitly constructed collaborators and
/// cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration
    /// * `credentials` - Account backend used by the authentication stage
    #[must_use]
    pub fn new(config: AppConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                credentials,
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get the credential store.
    #[must_use]
    pub fn credentials(&self) -> &dyn CredentialStore {
        self.inner.credentials.as_ref()
    }
}
