//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! reloop-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOCK_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

use secrecy::ExposeSecret;
use sqlx::PgPool;

use reloop_stock::StockConfig;

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("configuration error: {0}")]
    Config(#[from] reloop_stock::config::ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the stock database migrations from `crates/stock/migrations/`.
///
/// # Errors
///
/// Returns `MigrationError` when the database is unreachable or a migration
/// fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    let config = StockConfig::from_env()?;

    tracing::info!("Connecting to stock database...");
    let pool = PgPool::connect(config.database_url.expose_secret()).await?;

    tracing::info!("Running stock migrations...");
    sqlx::migrate!("../stock/migrations").run(&pool).await?;

    tracing::info!("Stock migrations complete");
    Ok(())
}
