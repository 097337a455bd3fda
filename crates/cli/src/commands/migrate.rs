//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! tristore migrate
//! ```
//!
//! # Environment Variables
//!
//! - `TRISTORE_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/engine/migrations/`.

use super::{CommandError, connect};

/// Apply pending relational migrations.
///
/// # Errors
///
/// Returns an error if configuration is missing, the database is unreachable
/// or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../engine/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
