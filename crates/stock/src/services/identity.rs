//! Device identity resolution.
//!
//! Receiving a serialized unit means answering "which device is this?" for a
//! scanned identifier. Resolution is idempotent: the same identifier always
//! maps to the same device row, no matter how many times it is scanned.

use sqlx::{Acquire, PgConnection, PgPool};

use reloop_core::{TenantContext, TenantId, UnitIdentifier, WarehouseId};

use crate::db::{self, RepositoryError};
use crate::error::StockError;
use crate::models::{Device, NewDevice, ResolvedDevice, SkuSpec};

/// An injected, optional source of SKU enrichment attributes.
///
/// The catalog may be absent, stale, or down; resolution degrades to blank
/// enrichment instead of failing the receipt.
#[allow(async_fn_in_trait)]
pub trait SkuSpecSource {
    /// Look up enrichment attributes for a SKU.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Upstream` when the catalog cannot answer.
    async fn lookup(&self, tenant_id: TenantId, sku: &str) -> Result<Option<SkuSpec>, StockError>;
}

/// Spec catalog backed by the `sku_spec` table.
#[derive(Debug, Clone)]
pub struct PgSpecCatalog {
    pool: PgPool,
}

impl PgSpecCatalog {
    /// Create a new catalog over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SkuSpecSource for PgSpecCatalog {
    async fn lookup(&self, tenant_id: TenantId, sku: &str) -> Result<Option<SkuSpec>, StockError> {
        db::device::find_sku_spec(&self.pool, tenant_id, sku)
            .await
            .map_err(|e| StockError::Upstream(format!("sku spec lookup for '{sku}': {e}")))
    }
}

/// The absent catalog: every lookup answers "no spec".
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpecSource;

impl SkuSpecSource for NullSpecSource {
    async fn lookup(&self, _tenant_id: TenantId, _sku: &str) -> Result<Option<SkuSpec>, StockError> {
        Ok(None)
    }
}

/// Maps a scanned identifier to a unique device record, creating one on
/// first sight.
#[derive(Debug, Clone)]
pub struct DeviceIdentityResolver<S> {
    specs: S,
    default_warehouse: WarehouseId,
}

impl<S: SkuSpecSource> DeviceIdentityResolver<S> {
    /// Create a resolver with the given spec source and fallback warehouse.
    pub const fn new(specs: S, default_warehouse: WarehouseId) -> Self {
        Self {
            specs,
            default_warehouse,
        }
    }

    /// Resolve a scanned identifier to a device, creating the device row on
    /// first sight. Runs on the caller's transaction.
    ///
    /// Creation order: enriched insert, minimal insert, then one re-query to
    /// catch a concurrent creator. Each insert attempt runs under a
    /// savepoint so a failure leaves the caller's transaction usable.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Conflict` when the device can neither be created
    /// nor found, `StockError::Repository` for database failures.
    pub async fn resolve(
        &self,
        conn: &mut PgConnection,
        ctx: &TenantContext,
        sku: &str,
        identifier: &UnitIdentifier,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<ResolvedDevice, StockError> {
        if let Some(existing) = db::device::find_by_identifier(conn, ctx.tenant_id, identifier).await?
        {
            return Ok(ResolvedDevice {
                id: existing.id,
                created: false,
            });
        }

        let spec = match self.specs.lookup(ctx.tenant_id, sku).await {
            Ok(spec) => spec,
            Err(err) => {
                tracing::warn!(sku, error = %err, "spec enrichment unavailable, creating device with blank attributes");
                None
            }
        };

        let input = NewDevice {
            tenant_id: ctx.tenant_id,
            warehouse_id: warehouse_id.unwrap_or(self.default_warehouse),
            sku: sku.to_string(),
            identifier: identifier.clone(),
            spec,
        };

        match insert_in_savepoint(conn, &input).await {
            Ok(device) => {
                return Ok(ResolvedDevice {
                    id: device.id,
                    created: true,
                });
            }
            Err(err) => {
                tracing::warn!(
                    sku,
                    identifier = %identifier,
                    error = %err,
                    "enriched device insert failed, retrying with minimal fields"
                );
            }
        }

        let minimal = NewDevice {
            spec: None,
            ..input
        };
        match insert_in_savepoint(conn, &minimal).await {
            Ok(device) => {
                return Ok(ResolvedDevice {
                    id: device.id,
                    created: true,
                });
            }
            Err(err) => {
                tracing::warn!(
                    sku,
                    identifier = %identifier,
                    error = %err,
                    "minimal device insert failed, re-querying for a concurrent creator"
                );
            }
        }

        // A concurrent receiver may have registered the identifier between
        // our first lookup and the insert attempts.
        if let Some(existing) = db::device::find_by_identifier(conn, ctx.tenant_id, identifier).await?
        {
            return Ok(ResolvedDevice {
                id: existing.id,
                created: false,
            });
        }

        Err(StockError::Conflict(format!(
            "could not create device for sku '{sku}' identifier '{identifier}'"
        )))
    }
}

/// Run a device insert under a savepoint so that a failed attempt does not
/// abort the enclosing transaction.
async fn insert_in_savepoint(
    conn: &mut PgConnection,
    input: &NewDevice,
) -> Result<Device, RepositoryError> {
    let mut savepoint = conn.begin().await?;
    match db::device::insert(&mut *savepoint, input).await {
        Ok(device) => {
            savepoint.commit().await?;
            Ok(device)
        }
        Err(err) => {
            savepoint.rollback().await?;
            Err(err)
        }
    }
}
