//! Database operations for purchase orders and purchase lines.
//!
//! Received quantities are always recomputed from `receipt_record` sums at
//! query time; nothing here caches them on the line.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use sqlx::postgres::PgExecutor;

use reloop_core::{PurchaseId, PurchaseLineId, TenantId, WarehouseId};

use super::{RepositoryError, conflict_on};
use crate::models::{
    BatchSnapshot, ConsumptionOrder, NewPurchaseLine, NewPurchaseOrder, PurchaseFilter,
    PurchaseLine, PurchaseLineWithReceived, PurchaseOrder, PurchaseOrderSummary,
};

/// Unique constraint on (`tenant_id`, `order_no`).
const UQ_ORDER_NO: &str = "uq_purchase_order_tenant_order_no";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for purchase order queries.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderRow {
    id: i32,
    tenant_id: i32,
    warehouse_id: i32,
    order_no: String,
    supplier_name: Option<String>,
    supplier_contact: Option<String>,
    expected_delivery_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PurchaseOrderRow> for PurchaseOrder {
    fn from(row: PurchaseOrderRow) -> Self {
        Self {
            id: PurchaseId::new(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            warehouse_id: WarehouseId::new(row.warehouse_id),
            order_no: row.order_no,
            supplier_name: row.supplier_name,
            supplier_contact: row.supplier_contact,
            expected_delivery_date: row.expected_delivery_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for purchase line queries.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseLineRow {
    id: i32,
    purchase_id: i32,
    sku: String,
    quantity_ordered: i32,
    quantity_used_for_repair: i32,
    unit_price: Decimal,
    is_serialized: bool,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PurchaseLineRow> for PurchaseLine {
    fn from(row: PurchaseLineRow) -> Self {
        Self {
            id: PurchaseLineId::new(row.id),
            purchase_id: PurchaseId::new(row.purchase_id),
            sku: row.sku,
            quantity_ordered: row.quantity_ordered,
            quantity_used_for_repair: row.quantity_used_for_repair,
            unit_price: row.unit_price,
            is_serialized: row.is_serialized,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for line-with-received queries.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseLineWithReceivedRow {
    id: i32,
    purchase_id: i32,
    sku: String,
    quantity_ordered: i32,
    quantity_used_for_repair: i32,
    unit_price: Decimal,
    is_serialized: bool,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    received_quantity: i64,
}

impl From<PurchaseLineWithReceivedRow> for PurchaseLineWithReceived {
    fn from(row: PurchaseLineWithReceivedRow) -> Self {
        Self {
            line: PurchaseLine {
                id: PurchaseLineId::new(row.id),
                purchase_id: PurchaseId::new(row.purchase_id),
                sku: row.sku,
                quantity_ordered: row.quantity_ordered,
                quantity_used_for_repair: row.quantity_used_for_repair,
                unit_price: row.unit_price,
                is_serialized: row.is_serialized,
                active: row.active,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            received_quantity: row.received_quantity,
        }
    }
}

/// Internal row type for the paginated order listing.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseOrderSummaryRow {
    id: i32,
    tenant_id: i32,
    warehouse_id: i32,
    order_no: String,
    supplier_name: Option<String>,
    supplier_contact: Option<String>,
    expected_delivery_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    quantity_ordered: i64,
    quantity_received: i64,
}

impl From<PurchaseOrderSummaryRow> for PurchaseOrderSummary {
    fn from(row: PurchaseOrderSummaryRow) -> Self {
        Self {
            order: PurchaseOrder {
                id: PurchaseId::new(row.id),
                tenant_id: TenantId::new(row.tenant_id),
                warehouse_id: WarehouseId::new(row.warehouse_id),
                order_no: row.order_no,
                supplier_name: row.supplier_name,
                supplier_contact: row.supplier_contact,
                expected_delivery_date: row.expected_delivery_date,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            quantity_ordered: row.quantity_ordered,
            quantity_received: row.quantity_received,
        }
    }
}

/// Internal row type for batch availability snapshots.
#[derive(Debug, sqlx::FromRow)]
struct BatchSnapshotRow {
    purchase_line_id: i32,
    unit_price: Decimal,
    quantity_used_for_repair: i32,
    created_at: DateTime<Utc>,
    received_quantity: i64,
}

impl From<BatchSnapshotRow> for BatchSnapshot {
    fn from(row: BatchSnapshotRow) -> Self {
        Self {
            purchase_line_id: PurchaseLineId::new(row.purchase_line_id),
            unit_price: row.unit_price,
            received_quantity: row.received_quantity,
            quantity_used_for_repair: row.quantity_used_for_repair,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for the line context lookup.
#[derive(Debug, sqlx::FromRow)]
struct LineContextRow {
    sku: String,
    warehouse_id: i32,
}

// =============================================================================
// Purchase Orders
// =============================================================================

/// Insert a purchase order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if `order_no` is already taken within
/// the tenant, `RepositoryError::Database` for other database errors.
pub async fn insert_order<'e, E>(
    executor: E,
    tenant_id: TenantId,
    order_no: &str,
    input: &NewPurchaseOrder,
) -> Result<PurchaseOrder, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, PurchaseOrderRow>(
        r"
        INSERT INTO purchase_order (
            tenant_id, warehouse_id, order_no, supplier_name,
            supplier_contact, expected_delivery_date
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING
            id, tenant_id, warehouse_id, order_no, supplier_name,
            supplier_contact, expected_delivery_date, created_at, updated_at
        ",
    )
    .bind(tenant_id)
    .bind(input.warehouse_id)
    .bind(order_no)
    .bind(&input.supplier_name)
    .bind(&input.supplier_contact)
    .bind(input.expected_delivery_date)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        conflict_on(
            e,
            UQ_ORDER_NO,
            format!("order number '{order_no}' already exists for tenant {tenant_id}"),
        )
    })?;

    Ok(row.into())
}

/// Get a purchase order by ID, scoped to the tenant.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_order<'e, E>(
    executor: E,
    tenant_id: TenantId,
    id: PurchaseId,
) -> Result<Option<PurchaseOrder>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, PurchaseOrderRow>(
        r"
        SELECT
            id, tenant_id, warehouse_id, order_no, supplier_name,
            supplier_contact, expected_delivery_date, created_at, updated_at
        FROM purchase_order
        WHERE tenant_id = $1 AND id = $2
        ",
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Into::into))
}

/// List purchase orders with their ordered/received totals.
///
/// Totals cover active lines only; received quantities come from the receipt
/// log, so the fully-received flag derived from them is always current.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_orders<'e, E>(
    executor: E,
    tenant_id: TenantId,
    filter: &PurchaseFilter,
) -> Result<Vec<PurchaseOrderSummary>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let limit = filter.limit.unwrap_or(100);
    let offset = filter.offset.unwrap_or(0);

    let rows = sqlx::query_as::<_, PurchaseOrderSummaryRow>(
        r"
        SELECT q.* FROM (
            SELECT
                po.id, po.tenant_id, po.warehouse_id, po.order_no,
                po.supplier_name, po.supplier_contact, po.expected_delivery_date,
                po.created_at, po.updated_at,
                COALESCE(SUM(pl.quantity_ordered) FILTER (WHERE pl.active), 0)::bigint
                    AS quantity_ordered,
                COALESCE(SUM(r.received) FILTER (WHERE pl.active), 0)::bigint
                    AS quantity_received
            FROM purchase_order po
            LEFT JOIN purchase_line pl ON pl.purchase_id = po.id
            LEFT JOIN LATERAL (
                SELECT COALESCE(SUM(rr.quantity), 0)::bigint AS received
                FROM receipt_record rr
                WHERE rr.purchase_line_id = pl.id
            ) r ON TRUE
            WHERE po.tenant_id = $1
              AND ($2::int IS NULL OR po.warehouse_id = $2)
              AND ($3::text IS NULL OR po.supplier_name ILIKE '%' || $3 || '%')
            GROUP BY po.id
        ) q
        WHERE ($4::bool IS NULL
               OR ($4 AND q.quantity_received >= q.quantity_ordered)
               OR (NOT $4 AND q.quantity_received < q.quantity_ordered))
        ORDER BY q.created_at DESC, q.id DESC
        LIMIT $5 OFFSET $6
        ",
    )
    .bind(tenant_id)
    .bind(filter.warehouse_id)
    .bind(&filter.supplier)
    .bind(filter.fully_received)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

// =============================================================================
// Purchase Lines
// =============================================================================

/// Insert a purchase line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_line<'e, E>(
    executor: E,
    input: &NewPurchaseLine,
) -> Result<PurchaseLine, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, PurchaseLineRow>(
        r"
        INSERT INTO purchase_line (
            purchase_id, sku, quantity_ordered, unit_price, is_serialized
        )
        VALUES ($1, $2, $3, $4, $5)
        RETURNING
            id, purchase_id, sku, quantity_ordered, quantity_used_for_repair,
            unit_price, is_serialized, active, created_at, updated_at
        ",
    )
    .bind(input.purchase_id)
    .bind(&input.sku)
    .bind(input.quantity_ordered)
    .bind(input.unit_price)
    .bind(input.is_serialized)
    .fetch_one(executor)
    .await?;

    Ok(row.into())
}

/// Get a purchase line by ID, scoped to the tenant via its order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_line<'e, E>(
    executor: E,
    tenant_id: TenantId,
    id: PurchaseLineId,
) -> Result<Option<PurchaseLine>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, PurchaseLineRow>(
        r"
        SELECT
            pl.id, pl.purchase_id, pl.sku, pl.quantity_ordered,
            pl.quantity_used_for_repair, pl.unit_price, pl.is_serialized,
            pl.active, pl.created_at, pl.updated_at
        FROM purchase_line pl
        JOIN purchase_order po ON po.id = pl.purchase_id
        WHERE po.tenant_id = $1 AND pl.id = $2
        ",
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Into::into))
}

/// Get a purchase line with its received-quantity sum.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn line_with_received<'e, E>(
    executor: E,
    tenant_id: TenantId,
    id: PurchaseLineId,
) -> Result<Option<PurchaseLineWithReceived>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, PurchaseLineWithReceivedRow>(
        r"
        SELECT
            pl.id, pl.purchase_id, pl.sku, pl.quantity_ordered,
            pl.quantity_used_for_repair, pl.unit_price, pl.is_serialized,
            pl.active, pl.created_at, pl.updated_at,
            COALESCE(SUM(rr.quantity), 0)::bigint AS received_quantity
        FROM purchase_line pl
        JOIN purchase_order po ON po.id = pl.purchase_id
        LEFT JOIN receipt_record rr ON rr.purchase_line_id = pl.id
        WHERE po.tenant_id = $1 AND pl.id = $2
        GROUP BY pl.id
        ",
    )
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Into::into))
}

/// List a purchase order's lines with their received-quantity sums.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines_with_received<'e, E>(
    executor: E,
    tenant_id: TenantId,
    purchase_id: PurchaseId,
) -> Result<Vec<PurchaseLineWithReceived>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, PurchaseLineWithReceivedRow>(
        r"
        SELECT
            pl.id, pl.purchase_id, pl.sku, pl.quantity_ordered,
            pl.quantity_used_for_repair, pl.unit_price, pl.is_serialized,
            pl.active, pl.created_at, pl.updated_at,
            COALESCE(SUM(rr.quantity), 0)::bigint AS received_quantity
        FROM purchase_line pl
        JOIN purchase_order po ON po.id = pl.purchase_id
        LEFT JOIN receipt_record rr ON rr.purchase_line_id = pl.id
        WHERE po.tenant_id = $1 AND pl.purchase_id = $2
        GROUP BY pl.id
        ORDER BY pl.created_at ASC, pl.id ASC
        ",
    )
    .bind(tenant_id)
    .bind(purchase_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

// =============================================================================
// Allocation support
// =============================================================================

/// Lock the active purchase lines for a (tenant, warehouse, SKU) triple.
///
/// Takes row locks (`FOR UPDATE`) in a stable order so concurrent allocate
/// and deallocate calls against the same SKU serialize instead of racing the
/// availability read. Returns the locked line IDs.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_batches(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    sku: &str,
) -> Result<Vec<PurchaseLineId>, RepositoryError> {
    let ids = sqlx::query_scalar::<_, i32>(
        r"
        SELECT pl.id
        FROM purchase_line pl
        JOIN purchase_order po ON po.id = pl.purchase_id
        WHERE po.tenant_id = $1 AND po.warehouse_id = $2
          AND pl.sku = $3 AND pl.active
        ORDER BY pl.id
        FOR UPDATE OF pl
        ",
    )
    .bind(tenant_id)
    .bind(warehouse_id)
    .bind(sku)
    .fetch_all(conn)
    .await?;

    Ok(ids.into_iter().map(PurchaseLineId::new).collect())
}

/// Availability snapshots for previously locked lines, in consumption order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn batch_snapshots(
    conn: &mut PgConnection,
    line_ids: &[PurchaseLineId],
    order: ConsumptionOrder,
) -> Result<Vec<BatchSnapshot>, RepositoryError> {
    let ids: Vec<i32> = line_ids.iter().map(|id| id.as_i32()).collect();

    let sql = match order {
        ConsumptionOrder::Fifo => {
            r"
            SELECT
                pl.id AS purchase_line_id, pl.unit_price,
                pl.quantity_used_for_repair, pl.created_at,
                COALESCE(SUM(rr.quantity), 0)::bigint AS received_quantity
            FROM purchase_line pl
            LEFT JOIN receipt_record rr ON rr.purchase_line_id = pl.id
            WHERE pl.id = ANY($1)
            GROUP BY pl.id
            ORDER BY pl.created_at ASC, pl.id ASC
            "
        }
        ConsumptionOrder::Lifo => {
            r"
            SELECT
                pl.id AS purchase_line_id, pl.unit_price,
                pl.quantity_used_for_repair, pl.created_at,
                COALESCE(SUM(rr.quantity), 0)::bigint AS received_quantity
            FROM purchase_line pl
            LEFT JOIN receipt_record rr ON rr.purchase_line_id = pl.id
            WHERE pl.id = ANY($1)
            GROUP BY pl.id
            ORDER BY pl.created_at DESC, pl.id DESC
            "
        }
    };

    let rows = sqlx::query_as::<_, BatchSnapshotRow>(sql)
        .bind(&ids)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Atomically increment a line's repair consumption.
///
/// Only call for lines locked by [`lock_batches`] in the same transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn add_repair_consumption<'e, E>(
    executor: E,
    line_id: PurchaseLineId,
    quantity: i32,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r"
        UPDATE purchase_line
        SET quantity_used_for_repair = quantity_used_for_repair + $2,
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(line_id)
    .bind(quantity)
    .execute(executor)
    .await?;

    Ok(())
}

/// Atomically decrement a line's repair consumption, refusing to go negative.
///
/// Returns `false` when the line does not exist for the tenant or the
/// decrement would drive `quantity_used_for_repair` below zero.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn remove_repair_consumption<'e, E>(
    executor: E,
    tenant_id: TenantId,
    line_id: PurchaseLineId,
    quantity: i32,
) -> Result<bool, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r"
        UPDATE purchase_line pl
        SET quantity_used_for_repair = pl.quantity_used_for_repair - $3,
            updated_at = now()
        FROM purchase_order po
        WHERE pl.id = $2 AND po.id = pl.purchase_id AND po.tenant_id = $1
          AND pl.quantity_used_for_repair >= $3
        ",
    )
    .bind(tenant_id)
    .bind(line_id)
    .bind(quantity)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// The SKU and warehouse a line belongs to, for ledger maintenance.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn line_context<'e, E>(
    executor: E,
    tenant_id: TenantId,
    line_id: PurchaseLineId,
) -> Result<Option<(String, WarehouseId)>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, LineContextRow>(
        r"
        SELECT pl.sku, po.warehouse_id
        FROM purchase_line pl
        JOIN purchase_order po ON po.id = pl.purchase_id
        WHERE po.tenant_id = $1 AND pl.id = $2
        ",
    )
    .bind(tenant_id)
    .bind(line_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|r| (r.sku, WarehouseId::new(r.warehouse_id))))
}
