//! Application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LANTERN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `LANTERN_SESSION_SECRET` - Cookie signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `LANTERN_HOST` - Bind address (default: 127.0.0.1)
//! - `LANTERN_PORT` - Listen port (default: 3000, falls back to `PORT`)
//! - `LANTERN_BASE_URL` - Public URL; `https://` turns on Secure cookies
//! - `LANTERN_PUBLIC_DIR` - Static asset directory (default: crates/web/public)
//! - `LANTERN_SESSION_TTL_SECS` - Sliding session lifetime (default: 7 days)
//! - `LANTERN_SESSION_TOUCH_SECS` - Minimum interval between session refreshes (default: 24 hours)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Session lifetime when `LANTERN_SESSION_TTL_SECS` is unset (7 days).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Touch interval when `LANTERN_SESSION_TOUCH_SECS` is unset (24 hours).
pub const DEFAULT_SESSION_TOUCH_SECS: i64 = 24 * 60 * 60;

/// Substrings that mark a secret as a copy-pasted placeholder (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "thisshouldbe",
    "password",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the site
    pub base_url: String,
    /// Cookie signing secret
    pub session_secret: SecretString,
    /// Session lifetime and refresh policy
    pub session: SessionSettings,
    /// Directory served by the static asset stage
    pub public_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Sliding-expiry settings for session records.
///
/// A record expires `ttl_secs` after it was last written. Requests refresh
/// the record at most once every `touch_after_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub ttl_secs: i64,
    pub touch_after_secs: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            touch_after_secs: DEFAULT_SESSION_TOUCH_SECS,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = database_url_from_env()?;
        let host = get_parsed_env::<IpAddr>("LANTERN_HOST", "127.0.0.1")?;
        let port = match get_optional_env("LANTERN_PORT") {
            Some(_) => get_parsed_env::<u16>("LANTERN_PORT", "3000")?,
            None => get_parsed_env::<u16>("PORT", "3000")?,
        };
        let base_url = get_env_or_default("LANTERN_BASE_URL", "http://localhost:3000");

        let session_secret = SecretString::from(get_required_env("LANTERN_SESSION_SECRET")?);
        validate_session_secret(&session_secret, "LANTERN_SESSION_SECRET")?;

        let session = SessionSettings {
            ttl_secs: get_positive_secs("LANTERN_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            touch_after_secs: get_positive_secs(
                "LANTERN_SESSION_TOUCH_SECS",
                DEFAULT_SESSION_TOUCH_SECS,
            )?,
        };

        let public_dir = PathBuf::from(get_env_or_default(
            "LANTERN_PUBLIC_DIR",
            "crates/web/public",
        ));

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            session,
            public_dir,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Read the database URL, falling back to the generic `DATABASE_URL`.
///
/// Shared with the CLI, which needs the database but no session secret.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    const PRIMARY: &str = "LANTERN_DATABASE_URL";

    std::env::var(PRIMARY)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(PRIMARY.to_string()))
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, using `default` when it is unset.
fn get_parsed_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn get_positive_secs(key: &str, default: i64) -> Result<i64, ConfigError> {
    let secs = get_parsed_env::<i64>(key, &default.to_string())?;
    if secs <= 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be a positive number of seconds (got {secs})"),
        ));
    }
    Ok(secs)
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject session secrets that are short, placeholders, or low entropy.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    let insecure = |reason: String| ConfigError::InsecureSecret(var_name.to_string(), reason);

    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(insecure(format!(
            "must be at least {MIN_SESSION_SECRET_LENGTH} characters (got {})",
            value.len()
        )));
    }

    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(insecure(format!(
            "appears to be a placeholder (contains '{pattern}')"
        )));
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GOOD_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_uniform_pair() {
        let entropy = shannon_entropy("abab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_session_secret_too_short() {
        let err = validate_session_secret(&SecretString::from("aB3$xY9!"), "S").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, ref why) if why.contains("at least 32")));
    }

    #[test]
    fn test_session_secret_placeholder() {
        // The fallback secret shipped by many tutorials must be refused.
        let secret = SecretString::from("thisshouldbeabettersecret!-padding-padding");
        let err = validate_session_secret(&secret, "S").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, ref why) if why.contains("placeholder")));
    }

    #[test]
    fn test_session_secret_low_entropy() {
        let secret = SecretString::from("ab".repeat(32));
        let err = validate_session_secret(&secret, "S").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, ref why) if why.contains("entropy")));
    }

    #[test]
    fn test_session_secret_valid() {
        assert!(validate_session_secret(&SecretString::from(GOOD_SECRET), "S").is_ok());
    }

    #[test]
    fn test_session_settings_default() {
        let settings = SessionSettings::default();
        assert_eq!(settings.ttl_secs, 604_800);
        assert_eq!(settings.touch_after_secs, 86_400);
    }

    #[test]
    fn test_socket_addr_and_secure_flag() {
        let mut config = AppConfig {
            database_url: SecretString::from("postgres://localhost/lantern"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from(GOOD_SECRET),
            session: SessionSettings::default(),
            public_dir: PathBuf::from("public"),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());

        config.base_url = "https://lantern.example".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = AppConfig {
            database_url: SecretString::from("postgres://user:hunter2@db/lantern"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from(GOOD_SECRET),
            session: SessionSettings::default(),
            public_dir: PathBuf::from("public"),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains(GOOD_SECRET));
    }
}
