//! Flash messages: single-delivery notices kept in the session.
//!
//! A handler enqueues a message before redirecting; the next request that
//! drains the queue (the render-context stage does, once per request) gets it,
//! and it is gone from the session afterwards.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::AppError;

/// Kind of flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Error,
}

impl FlashCategory {
    /// Session key holding this category's queue.
    #[must_use]
    pub const fn session_key(self) -> &'static str {
        match self {
            Self::Success => "flash.success",
            Self::Error => "flash.error",
        }
    }
}

/// Handle to the current session's flash queues.
///
/// Extract it in a handler, or build one from a [`Session`] anywhere else.
#[derive(Clone)]
pub struct Flash {
    session: Session,
}

impl Flash {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Append a message to the `category` queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the session record cannot be read or written.
    pub async fn enqueue(
        &self,
        category: FlashCategory,
        text: impl Into<String>,
    ) -> Result<(), tower_sessions::session::Error> {
        let key = category.session_key();
        let mut queue: Vec<String> = self.session.get(key).await?.unwrap_or_default();
        queue.push(text.into());
        self.session.insert(key, queue).await
    }

    /// Queue a success notice.
    ///
    /// # Errors
    ///
    /// Returns an error if the session record cannot be read or written.
    pub async fn success(&self, text: impl Into<String>) -> Result<(), tower_sessions::session::Error> {
        self.enqueue(FlashCategory::Success, text).await
    }

    /// Queue an error notice.
    ///
    /// # Errors
    ///
    /// Returns an error if the session record cannot be read or written.
    pub async fn error(&self, text: impl Into<String>) -> Result<(), tower_sessions::session::Error> {
        self.enqueue(FlashCategory::Error, text).await
    }

    /// Take every queued message of `category` out of the session.
    ///
    /// An empty queue leaves the session unmodified, so draining on every
    /// request does not force a save.
    ///
    /// # Errors
    ///
    /// Returns an error if the session record cannot be read or written.
    pub async fn drain(
        &self,
        category: FlashCategory,
    ) -> Result<Vec<String>, tower_sessions::session::Error> {
        let key = category.session_key();
        if self.session.get::<Vec<String>>(key).await?.is_none() {
            return Ok(Vec::new());
        }
        Ok(self
            .session
            .remove::<Vec<String>>(key)
            .await?
            .unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(Self::new)
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn flash() -> Flash {
        Flash::new(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    #[tokio::test]
    async fn test_drain_returns_queue_once() {
        let flash = flash();
        flash.success("Welcome").await.unwrap();
        flash.success("Again").await.unwrap();

        assert_eq!(
            flash.drain(FlashCategory::Success).await.unwrap(),
            vec!["Welcome".to_string(), "Again".to_string()]
        );
        assert!(flash.drain(FlashCategory::Success).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_categories_are_independent() {
        let flash = flash();
        flash.error("Nope").await.unwrap();

        assert!(flash.drain(FlashCategory::Success).await.unwrap().is_empty());
        assert_eq!(
            flash.drain(FlashCategory::Error).await.unwrap(),
            vec!["Nope".to_string()]
        );
    }

    #[tokio::test]
    async fn test_drain_empty_leaves_session_unmodified() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let flash = Flash::new(session.clone());

        assert!(flash.drain(FlashCategory::Error).await.unwrap().is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_session_keys_are_distinct() {
        assert_ne!(
            FlashCategory::Success.session_key(),
            FlashCategory::Error.session_key()
        );
    }
}
