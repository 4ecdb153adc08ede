//! Stock ledger domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reloop_core::{StockLedgerId, TenantId, WarehouseId};

/// The per-(tenant, warehouse, SKU) stock aggregate.
///
/// Created lazily on first receipt of a SKU. `quantity` is a materialized
/// cache maintained transactionally by receiving and allocation; the receipt
/// log stays authoritative and `reloop-cli ledger reconcile` recomputes the
/// cache from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    /// Unique ledger row ID.
    pub id: StockLedgerId,
    /// Tenant the row belongs to.
    pub tenant_id: TenantId,
    /// Warehouse the stock sits in.
    pub warehouse_id: WarehouseId,
    /// Stock-keeping unit.
    pub sku: String,
    /// Cached on-hand quantity (received minus repair consumption).
    pub quantity: i64,
    /// Whether the SKU is a bulk part (as opposed to serialized devices).
    pub is_part: bool,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}
