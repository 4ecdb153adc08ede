//! Device domain models for unit-level identity tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reloop_core::{DeviceId, TenantId, UnitIdentifier, WarehouseId};

/// A physical unit with a scanned identifier (IMEI or serial).
///
/// Device rows are created at most once per identifier and are never deleted
/// by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Unique device ID.
    pub id: DeviceId,
    /// Tenant the device belongs to.
    pub tenant_id: TenantId,
    /// Warehouse the device was received into.
    pub warehouse_id: WarehouseId,
    /// Stock-keeping unit.
    pub sku: String,
    /// IMEI, when the scanned identifier was IMEI-shaped.
    pub imei: Option<String>,
    /// Serial number, for every other identifier shape.
    pub serial_no: Option<String>,
    /// Manufacturer, from spec enrichment.
    pub make: Option<String>,
    /// Model name, from spec enrichment.
    pub model: Option<String>,
    /// Storage size, from spec enrichment.
    pub storage: Option<String>,
    /// Color, from spec enrichment.
    pub color: Option<String>,
    /// When the device was first seen.
    pub created_at: DateTime<Utc>,
    /// When the device was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// The identifier the device was registered under.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.imei.as_deref().or(self.serial_no.as_deref())
    }
}

/// Enrichment attributes for a SKU, from the optional spec catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkuSpec {
    /// Manufacturer.
    pub make: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Storage size.
    pub storage: Option<String>,
    /// Color.
    pub color: Option<String>,
}

/// Input for inserting a device row.
#[derive(Debug, Clone)]
pub struct NewDevice {
    /// Tenant the device belongs to.
    pub tenant_id: TenantId,
    /// Warehouse the device was received into.
    pub warehouse_id: WarehouseId,
    /// Stock-keeping unit.
    pub sku: String,
    /// Classified identifier; lands in the IMEI or serial column.
    pub identifier: UnitIdentifier,
    /// Enrichment attributes; `None` when the catalog was unavailable.
    pub spec: Option<SkuSpec>,
}

/// Result of resolving a scanned identifier to a device.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDevice {
    /// The device the identifier maps to.
    pub id: DeviceId,
    /// Whether this resolution created the device row.
    pub created: bool,
}
