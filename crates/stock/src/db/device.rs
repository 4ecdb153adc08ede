//! Database operations for device identity rows.
//!
//! Device rows are write-once from this subsystem's point of view: they are
//! created on first sight of an identifier and never deleted here.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use sqlx::postgres::PgExecutor;

use reloop_core::{DeviceId, TenantId, UnitIdentifier, WarehouseId};

use super::{RepositoryError, is_unique_violation};
use crate::models::{Device, NewDevice, SkuSpec};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for device queries.
#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: i32,
    tenant_id: i32,
    warehouse_id: i32,
    sku: String,
    imei: Option<String>,
    serial_no: Option<String>,
    make: Option<String>,
    model: Option<String>,
    storage: Option<String>,
    color: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: DeviceId::new(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            warehouse_id: WarehouseId::new(row.warehouse_id),
            sku: row.sku,
            imei: row.imei,
            serial_no: row.serial_no,
            make: row.make,
            model: row.model,
            storage: row.storage,
            color: row.color,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_DEVICE: &str = r"
    SELECT
        id, tenant_id, warehouse_id, sku, imei, serial_no,
        make, model, storage, color, created_at, updated_at
    FROM device
";

// =============================================================================
// Queries
// =============================================================================

/// Find a device by scanned identifier, scoped to the tenant.
///
/// The IMEI column is checked first, then the serial column, regardless of
/// how the identifier classifies - an identifier registered under the other
/// column by earlier data must still resolve to its device.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_identifier(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    identifier: &UnitIdentifier,
) -> Result<Option<Device>, RepositoryError> {
    let by_imei = sqlx::query_as::<_, DeviceRow>(&format!(
        "{SELECT_DEVICE} WHERE tenant_id = $1 AND imei = $2"
    ))
    .bind(tenant_id)
    .bind(identifier.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = by_imei {
        return Ok(Some(row.into()));
    }

    let by_serial = sqlx::query_as::<_, DeviceRow>(&format!(
        "{SELECT_DEVICE} WHERE tenant_id = $1 AND serial_no = $2"
    ))
    .bind(tenant_id)
    .bind(identifier.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(by_serial.map(Into::into))
}

/// Get a device by ID, scoped to the tenant.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_id<'e, E>(
    executor: E,
    tenant_id: TenantId,
    id: DeviceId,
) -> Result<Option<Device>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, DeviceRow>(&format!(
        "{SELECT_DEVICE} WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Into::into))
}

/// Insert a device row, placing the identifier in the IMEI or serial column
/// per its classification.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the identifier is already
/// registered for the tenant, `RepositoryError::Database` for other
/// database errors.
pub async fn insert<'e, E>(executor: E, input: &NewDevice) -> Result<Device, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let (imei, serial_no) = match &input.identifier {
        UnitIdentifier::Imei(s) => (Some(s.as_str()), None),
        UnitIdentifier::Serial(s) => (None, Some(s.as_str())),
    };
    let spec = input.spec.clone().unwrap_or_default();

    let row = sqlx::query_as::<_, DeviceRow>(
        r"
        INSERT INTO device (
            tenant_id, warehouse_id, sku, imei, serial_no,
            make, model, storage, color
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING
            id, tenant_id, warehouse_id, sku, imei, serial_no,
            make, model, storage, color, created_at, updated_at
        ",
    )
    .bind(input.tenant_id)
    .bind(input.warehouse_id)
    .bind(&input.sku)
    .bind(imei)
    .bind(serial_no)
    .bind(spec.make)
    .bind(spec.model)
    .bind(spec.storage)
    .bind(spec.color)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            return RepositoryError::Conflict(format!(
                "identifier '{}' already registered for tenant {}",
                input.identifier, input.tenant_id
            ));
        }
        RepositoryError::Database(e)
    })?;

    Ok(row.into())
}

/// Look up enrichment attributes for a SKU in the optional spec catalog.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails (including when
/// the `sku_spec` table does not exist in this deployment).
pub async fn find_sku_spec<'e, E>(
    executor: E,
    tenant_id: TenantId,
    sku: &str,
) -> Result<Option<SkuSpec>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    #[derive(sqlx::FromRow)]
    struct SkuSpecRow {
        make: Option<String>,
        model: Option<String>,
        storage: Option<String>,
        color: Option<String>,
    }

    let row = sqlx::query_as::<_, SkuSpecRow>(
        r"
        SELECT make, model, storage, color
        FROM sku_spec
        WHERE tenant_id = $1 AND sku = $2
        ",
    )
    .bind(tenant_id)
    .bind(sku)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|r| SkuSpec {
        make: r.make,
        model: r.model,
        storage: r.storage,
        color: r.color,
    }))
}
