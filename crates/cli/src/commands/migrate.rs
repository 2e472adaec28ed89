//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! lantern-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `LANTERN_DATABASE_URL` - `PostgreSQL` connection string
//!   (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Schema migrations live in `crates/web/migrations/`. The session table is
//! created by the session store itself.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

/// Run the schema migrations, then create the session store's table.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../web/migrations").run(&pool).await?;

    tracing::info!("Creating session store table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
