//! Database operations for the per-warehouse stock ledger.
//!
//! The ledger row for a (tenant, warehouse, SKU) triple is created lazily on
//! first receipt. Its `quantity` is a materialized cache - receiving
//! increments it, allocation moves it, and [`reconcile`] recomputes it from
//! the receipt log when the cache is suspected stale.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use sqlx::postgres::PgExecutor;

use reloop_core::{DeviceId, StockLedgerId, TenantId, WarehouseId};

use super::RepositoryError;
use crate::models::StockLedgerEntry;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for ledger queries.
#[derive(Debug, sqlx::FromRow)]
struct StockLedgerRow {
    id: i32,
    tenant_id: i32,
    warehouse_id: i32,
    sku: String,
    quantity: i64,
    is_part: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockLedgerRow> for StockLedgerEntry {
    fn from(row: StockLedgerRow) -> Self {
        Self {
            id: StockLedgerId::new(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            warehouse_id: WarehouseId::new(row.warehouse_id),
            sku: row.sku,
            quantity: row.quantity,
            is_part: row.is_part,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Get the ledger row for a (tenant, warehouse, SKU) triple.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find<'e, E>(
    executor: E,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    sku: &str,
) -> Result<Option<StockLedgerEntry>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, StockLedgerRow>(
        r"
        SELECT
            id, tenant_id, warehouse_id, sku, quantity, is_part,
            created_at, updated_at
        FROM stock_ledger
        WHERE tenant_id = $1 AND warehouse_id = $2 AND sku = $3
        ",
    )
    .bind(tenant_id)
    .bind(warehouse_id)
    .bind(sku)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Into::into))
}

/// Create-if-absent for a ledger row, tolerant of concurrent creators.
///
/// The chain: select; insert with `ON CONFLICT DO NOTHING`; re-select (a
/// concurrent creator won the race); finally re-point a same-tenant,
/// same-SKU row from another warehouse at the requested warehouse. Only
/// when all of that comes up empty does the caller see a `Conflict`.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` when no row can be produced,
/// `RepositoryError::Database` for other database errors.
pub async fn ensure_exists(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    sku: &str,
    is_part: bool,
) -> Result<StockLedgerId, RepositoryError> {
    if let Some(entry) = find(&mut *conn, tenant_id, warehouse_id, sku).await? {
        return Ok(entry.id);
    }

    let inserted = sqlx::query_scalar::<_, i32>(
        r"
        INSERT INTO stock_ledger (tenant_id, warehouse_id, sku, quantity, is_part)
        VALUES ($1, $2, $3, 0, $4)
        ON CONFLICT (tenant_id, warehouse_id, sku) DO NOTHING
        RETURNING id
        ",
    )
    .bind(tenant_id)
    .bind(warehouse_id)
    .bind(sku)
    .bind(is_part)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(StockLedgerId::new(id));
    }

    // Lost the creation race; the winner's row must be there now.
    if let Some(entry) = find(&mut *conn, tenant_id, warehouse_id, sku).await? {
        return Ok(entry.id);
    }

    // Last resort: a row for this SKU exists under another warehouse of the
    // same tenant (e.g. seeded before warehouses were split). Re-point it
    // instead of failing the receipt.
    let repointed = sqlx::query_scalar::<_, i32>(
        r"
        UPDATE stock_ledger
        SET warehouse_id = $2, updated_at = now()
        WHERE id = (
            SELECT id FROM stock_ledger
            WHERE tenant_id = $1 AND sku = $3
            ORDER BY id
            LIMIT 1
        )
        RETURNING id
        ",
    )
    .bind(tenant_id)
    .bind(warehouse_id)
    .bind(sku)
    .fetch_optional(&mut *conn)
    .await?;

    repointed.map(StockLedgerId::new).ok_or_else(|| {
        RepositoryError::Conflict(format!(
            "could not create or adopt stock ledger row for sku '{sku}' in warehouse {warehouse_id}"
        ))
    })
}

/// Move the cached quantity by `delta` (positive on receipt, negative on
/// allocation). A missing row is ignored: the cache is not authoritative.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn adjust_quantity<'e, E>(
    executor: E,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    sku: &str,
    delta: i64,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r"
        UPDATE stock_ledger
        SET quantity = quantity + $4, updated_at = now()
        WHERE tenant_id = $1 AND warehouse_id = $2 AND sku = $3
        ",
    )
    .bind(tenant_id)
    .bind(warehouse_id)
    .bind(sku)
    .bind(delta)
    .execute(executor)
    .await?;

    Ok(())
}

/// Add a serialized device to its ledger row's membership set. Idempotent.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn link_device<'e, E>(
    executor: E,
    ledger_id: StockLedgerId,
    device_id: DeviceId,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO stock_ledger_device (ledger_id, device_id)
        VALUES ($1, $2)
        ON CONFLICT (ledger_id, device_id) DO NOTHING
        ",
    )
    .bind(ledger_id)
    .bind(device_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Recompute cached quantities from the receipt log, optionally scoped to
/// one tenant. Returns the number of corrected rows.
///
/// The expected quantity of a ledger row is the sum of receipts for its
/// (tenant, warehouse, SKU) minus the repair consumption of the matching
/// purchase lines; only rows whose cache disagrees are touched.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn reconcile(
    conn: &mut PgConnection,
    tenant_id: Option<TenantId>,
) -> Result<u64, RepositoryError> {
    let done = sqlx::query(
        r"
        UPDATE stock_ledger sl
        SET quantity = sub.expected, updated_at = now()
        FROM (
            SELECT sl2.id,
                   (COALESCE((
                       SELECT SUM(rr.quantity)
                       FROM receipt_record rr
                       JOIN purchase_order po ON po.id = rr.purchase_id
                       WHERE rr.tenant_id = sl2.tenant_id
                         AND po.warehouse_id = sl2.warehouse_id
                         AND rr.sku = sl2.sku
                   ), 0)
                   - COALESCE((
                       SELECT SUM(pl.quantity_used_for_repair)
                       FROM purchase_line pl
                       JOIN purchase_order po ON po.id = pl.purchase_id
                       WHERE po.tenant_id = sl2.tenant_id
                         AND po.warehouse_id = sl2.warehouse_id
                         AND pl.sku = sl2.sku
                   ), 0))::bigint AS expected
            FROM stock_ledger sl2
            WHERE $1::int IS NULL OR sl2.tenant_id = $1
        ) sub
        WHERE sub.id = sl.id AND sl.quantity IS DISTINCT FROM sub.expected
        ",
    )
    .bind(tenant_id)
    .execute(conn)
    .await?;

    Ok(done.rows_affected())
}
