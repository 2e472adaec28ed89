//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username failed validation.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] lantern_core::UsernameError),

    /// Invalid credentials (wrong password or unknown user).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Reading or writing the session record failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether the strategy rejected the supplied username/password pair.
    ///
    /// These are the failures a login form reports back to the user; every
    /// other variant is an application failure.
    #[must_use]
    pub const fn is_rejected_credentials(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::InvalidUsername(_))
    }

    /// Message safe to show on a registration form, if this error has one.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::InvalidUsername(e) => Some(capitalize(&e.to_string())),
            Self::WeakPassword(msg) => Some(capitalize(msg)),
            Self::UserAlreadyExists => {
                Some("A user with the given username is already registered".to_string())
            }
            Self::InvalidCredentials => Some("Password or username is incorrect".to_string()),
            Self::Session(_) | Self::Repository(_) | Self::PasswordHash => None,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
