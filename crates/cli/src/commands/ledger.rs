//! Stock ledger maintenance commands.
//!
//! The ledger's cached quantity is maintained transactionally by receiving
//! and allocation; this job is the safety net that recomputes it from the
//! receipt log after manual data surgery or a suspected drift.

use reloop_core::TenantId;
use reloop_stock::StockConfig;
use reloop_stock::db::{self, RepositoryError};

/// Errors that can occur during ledger maintenance.
#[derive(Debug, thiserror::Error)]
pub enum LedgerCommandError {
    #[error("configuration error: {0}")]
    Config(#[from] reloop_stock::config::ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Recompute cached ledger quantities, optionally scoped to one tenant.
///
/// # Errors
///
/// Returns `LedgerCommandError` when the database is unreachable or the
/// reconcile statement fails.
pub async fn reconcile(tenant: Option<i32>) -> Result<(), LedgerCommandError> {
    let config = StockConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;

    let mut conn = pool.acquire().await?;
    let corrected =
        db::stock_ledger::reconcile(&mut conn, tenant.map(TenantId::new)).await?;

    match tenant {
        Some(tenant_id) => {
            tracing::info!(tenant_id, corrected, "ledger reconcile complete");
        }
        None => tracing::info!(corrected, "ledger reconcile complete (all tenants)"),
    }
    Ok(())
}
