//! CLI subcommands.

pub mod migrate;
pub mod user;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Database URL missing from the environment.
    #[error(transparent)]
    Config(#[from] lantern_web::config::ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Running migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Account creation failed.
    #[error(transparent)]
    Auth(#[from] lantern_web::services::AuthError),
}

/// Connect to the database named by `LANTERN_DATABASE_URL` (or `DATABASE_URL`).
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = lantern_web::config::database_url_from_env()?;

    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}
