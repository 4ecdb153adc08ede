//! Receipt records and receiving request/summary types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reloop_core::{ActorId, DeviceId, PurchaseId, PurchaseLineId, ReceiptId, TenantId, WarehouseId};

/// An immutable record of stock received against a purchase line.
///
/// Receipt rows are never updated or deleted; every received-quantity figure
/// in the system is a sum over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Unique receipt ID.
    pub id: ReceiptId,
    /// Parent purchase order.
    pub purchase_id: PurchaseId,
    /// Purchase line the stock was received against.
    pub purchase_line_id: PurchaseLineId,
    /// Stock-keeping unit.
    pub sku: String,
    /// Device, set iff the line is serialized (then quantity is 1).
    pub device_id: Option<DeviceId>,
    /// Units received.
    pub quantity: i32,
    /// Tenant the receipt belongs to.
    pub tenant_id: TenantId,
    /// User who recorded the receipt.
    pub received_by: ActorId,
    /// When the receipt was recorded.
    pub received_at: DateTime<Utc>,
}

/// One receiving request: a delivery arriving at a warehouse dock.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveRequest {
    /// Purchase order being received against.
    pub purchase_id: PurchaseId,
    /// Warehouse the stock arrives at.
    pub warehouse_id: WarehouseId,
    /// Per-line items in this delivery.
    pub items: Vec<ReceiveItem>,
}

/// One line item of a receiving request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReceiveItem {
    /// A bulk/part line received by quantity.
    Bulk {
        /// Purchase line being received against.
        purchase_line_id: PurchaseLineId,
        /// Stock-keeping unit.
        sku: String,
        /// Units received.
        quantity: i32,
    },
    /// A serialized line received as scanned identifiers, one unit each.
    Serialized {
        /// Purchase line being received against.
        purchase_line_id: PurchaseLineId,
        /// Stock-keeping unit.
        sku: String,
        /// Scanned IMEIs/serials.
        identifiers: Vec<String>,
    },
}

impl ReceiveItem {
    /// The purchase line this item targets.
    #[must_use]
    pub const fn purchase_line_id(&self) -> PurchaseLineId {
        match self {
            Self::Bulk {
                purchase_line_id, ..
            }
            | Self::Serialized {
                purchase_line_id, ..
            } => *purchase_line_id,
        }
    }

    /// The SKU this item targets.
    #[must_use]
    pub fn sku(&self) -> &str {
        match self {
            Self::Bulk { sku, .. } | Self::Serialized { sku, .. } => sku,
        }
    }
}

/// Outcome of a successful receiving call.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveSummary {
    /// Receipt records written, in item order.
    pub records: Vec<ReceiptRecord>,
    /// Devices created (as opposed to re-scanned) during this call.
    pub devices_created: u32,
    /// Lines that went beyond their ordered quantity in this call.
    pub over_received: Vec<OverReceipt>,
}

/// A line received beyond its ordered quantity. Allowed, but reported.
#[derive(Debug, Clone, Serialize)]
pub struct OverReceipt {
    /// The over-received line.
    pub purchase_line_id: PurchaseLineId,
    /// Stock-keeping unit.
    pub sku: String,
    /// Quantity ordered.
    pub quantity_ordered: i32,
    /// Total received after this call.
    pub received_quantity: i64,
}
