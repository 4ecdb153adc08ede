//! Database operations for the immutable receipt log.
//!
//! Receipt rows are append-only: no update or delete statements exist in
//! this module on purpose.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;

use reloop_core::{ActorId, DeviceId, PurchaseId, PurchaseLineId, ReceiptId, TenantId};

use crate::models::ReceiptRecord;

use super::RepositoryError;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for receipt queries.
#[derive(Debug, sqlx::FromRow)]
struct ReceiptRecordRow {
    id: i32,
    purchase_id: i32,
    purchase_line_id: i32,
    sku: String,
    device_id: Option<i32>,
    quantity: i32,
    tenant_id: i32,
    received_by: i32,
    received_at: DateTime<Utc>,
}

impl From<ReceiptRecordRow> for ReceiptRecord {
    fn from(row: ReceiptRecordRow) -> Self {
        Self {
            id: ReceiptId::new(row.id),
            purchase_id: PurchaseId::new(row.purchase_id),
            purchase_line_id: PurchaseLineId::new(row.purchase_line_id),
            sku: row.sku,
            device_id: row.device_id.map(DeviceId::new),
            quantity: row.quantity,
            tenant_id: TenantId::new(row.tenant_id),
            received_by: ActorId::new(row.received_by),
            received_at: row.received_at,
        }
    }
}

/// Input for one receipt row.
#[derive(Debug, Clone)]
pub struct NewReceipt {
    /// Parent purchase order.
    pub purchase_id: PurchaseId,
    /// Purchase line the stock was received against.
    pub purchase_line_id: PurchaseLineId,
    /// Stock-keeping unit.
    pub sku: String,
    /// Device, set iff the line is serialized.
    pub device_id: Option<DeviceId>,
    /// Units received.
    pub quantity: i32,
    /// Tenant the receipt belongs to.
    pub tenant_id: TenantId,
    /// User who recorded the receipt.
    pub received_by: ActorId,
}

// =============================================================================
// Queries
// =============================================================================

/// Append one receipt record.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert<'e, E>(executor: E, input: &NewReceipt) -> Result<ReceiptRecord, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ReceiptRecordRow>(
        r"
        INSERT INTO receipt_record (
            purchase_id, purchase_line_id, sku, device_id,
            quantity, tenant_id, received_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING
            id, purchase_id, purchase_line_id, sku, device_id,
            quantity, tenant_id, received_by, received_at
        ",
    )
    .bind(input.purchase_id)
    .bind(input.purchase_line_id)
    .bind(&input.sku)
    .bind(input.device_id)
    .bind(input.quantity)
    .bind(input.tenant_id)
    .bind(input.received_by)
    .fetch_one(executor)
    .await?;

    Ok(row.into())
}

/// Sum of receipt quantities recorded against a line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn received_for_line<'e, E>(
    executor: E,
    line_id: PurchaseLineId,
) -> Result<i64, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sum = sqlx::query_scalar::<_, i64>(
        r"
        SELECT COALESCE(SUM(quantity), 0)::bigint
        FROM receipt_record
        WHERE purchase_line_id = $1
        ",
    )
    .bind(line_id)
    .fetch_one(executor)
    .await?;

    Ok(sum)
}

/// List the receipt log for a purchase order, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_purchase<'e, E>(
    executor: E,
    tenant_id: TenantId,
    purchase_id: PurchaseId,
) -> Result<Vec<ReceiptRecord>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ReceiptRecordRow>(
        r"
        SELECT
            id, purchase_id, purchase_line_id, sku, device_id,
            quantity, tenant_id, received_by, received_at
        FROM receipt_record
        WHERE tenant_id = $1 AND purchase_id = $2
        ORDER BY received_at ASC, id ASC
        ",
    )
    .bind(tenant_id)
    .bind(purchase_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
