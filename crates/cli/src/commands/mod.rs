//! CLI command implementations.

pub mod migrate;
pub mod sequences;

use sqlx::PgPool;
use thiserror::Error;

use tristore_engine::store::StoreError;
use tristore_engine::store::postgres::create_pool;
use tristore_engine::{ConfigError, EngineConfig};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A store call failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Load configuration and connect to the relational database.
async fn connect() -> Result<PgPool, CommandError> {
    let config = EngineConfig::from_env()?;
    let database = config.require_database()?;

    tracing::info!(?database, "Connecting to database...");
    Ok(create_pool(database, &config).await?)
}
