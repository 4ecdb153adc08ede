//! Read-side purchase and stock queries.
//!
//! Pure aggregation over the write-side tables: remaining quantities, the
//! fully-received flag, the receipt log, and paginated order listings.
//! Nothing here mutates state.

use sqlx::PgPool;

use reloop_core::{PurchaseId, PurchaseLineId, TenantContext, WarehouseId};

use crate::db;
use crate::error::StockError;
use crate::models::{
    PurchaseFilter, PurchaseOrderDetail, PurchaseOrderSummary, ReceiptRecord, StockLedgerEntry,
};

/// Read-side aggregation over purchases, receipts, and the stock ledger.
#[derive(Debug, Clone)]
pub struct PurchaseQueries {
    pool: PgPool,
}

impl PurchaseQueries {
    /// Create a query service over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A purchase order with its lines and received quantities.
    ///
    /// # Errors
    ///
    /// Returns `StockError::NotFound` when the order does not exist for the
    /// tenant, `StockError::Repository` for database failures.
    pub async fn order_detail(
        &self,
        ctx: &TenantContext,
        purchase_id: PurchaseId,
    ) -> Result<PurchaseOrderDetail, StockError> {
        let order = db::purchase::find_order(&self.pool, ctx.tenant_id, purchase_id)
            .await?
            .ok_or_else(|| {
                StockError::NotFound(format!(
                    "purchase {} for tenant {}",
                    purchase_id, ctx.tenant_id
                ))
            })?;

        let lines = db::purchase::lines_with_received(&self.pool, ctx.tenant_id, purchase_id).await?;

        Ok(PurchaseOrderDetail { order, lines })
    }

    /// Paginated purchase order listing with ordered/received totals.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Repository` for database failures.
    pub async fn list_orders(
        &self,
        ctx: &TenantContext,
        filter: &PurchaseFilter,
    ) -> Result<Vec<PurchaseOrderSummary>, StockError> {
        db::purchase::list_orders(&self.pool, ctx.tenant_id, filter)
            .await
            .map_err(Into::into)
    }

    /// Remaining-to-receive quantity of a line, clamped at zero.
    ///
    /// # Errors
    ///
    /// Returns `StockError::NotFound` when the line does not exist for the
    /// tenant, `StockError::Repository` for database failures.
    pub async fn remaining_for_line(
        &self,
        ctx: &TenantContext,
        line_id: PurchaseLineId,
    ) -> Result<i64, StockError> {
        let line = db::purchase::line_with_received(&self.pool, ctx.tenant_id, line_id)
            .await?
            .ok_or_else(|| {
                StockError::NotFound(format!(
                    "purchase line {} for tenant {}",
                    line_id, ctx.tenant_id
                ))
            })?;

        Ok(line.remaining())
    }

    /// The immutable receipt log of a purchase order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Repository` for database failures.
    pub async fn receipt_log(
        &self,
        ctx: &TenantContext,
        purchase_id: PurchaseId,
    ) -> Result<Vec<ReceiptRecord>, StockError> {
        db::receipt::list_for_purchase(&self.pool, ctx.tenant_id, purchase_id)
            .await
            .map_err(Into::into)
    }

    /// The cached on-hand quantity for a (warehouse, SKU) pair, if a ledger
    /// row exists yet.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Repository` for database failures.
    pub async fn stock_on_hand(
        &self,
        ctx: &TenantContext,
        warehouse_id: WarehouseId,
        sku: &str,
    ) -> Result<Option<StockLedgerEntry>, StockError> {
        db::stock_ledger::find(&self.pool, ctx.tenant_id, warehouse_id, sku)
            .await
            .map_err(Into::into)
    }
}
