//! Database operations for the stock engine's `PostgreSQL` store.
//!
//! # Tables
//!
//! - `purchase_order` / `purchase_line` - the ordered-quantity contracts
//! - `receipt_record` - immutable receiving log (append-only)
//! - `device` - unit-level identity (IMEI/serial), write-once
//! - `stock_ledger` / `stock_ledger_device` - per-warehouse aggregates and
//!   serialized-unit membership
//! - `sku_spec` - optional enrichment catalog
//!
//! # Migrations
//!
//! Migrations are stored in `crates/stock/migrations/` and run via:
//! ```bash
//! cargo run -p reloop-cli -- migrate
//! ```
//!
//! # Composition
//!
//! Repository functions are generic over [`sqlx::postgres::PgExecutor`] (or
//! take a `&mut PgConnection` where they issue several statements), so the
//! services can compose them onto one transaction per engine call.

pub mod device;
pub mod purchase;
pub mod receipt;
pub mod stock_ledger;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a sqlx error onto `Conflict` when it is a violation of the named
/// constraint; pass everything else through as `Database`.
pub(crate) fn conflict_on(
    err: sqlx::Error,
    constraint: &str,
    message: impl Into<String>,
) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.constraint() == Some(constraint)
    {
        return RepositoryError::Conflict(message.into());
    }
    RepositoryError::Database(err)
}

/// Whether the error is any unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
