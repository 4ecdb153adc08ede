//! Purchase order and purchase line domain models.
//!
//! Purchase orders are created by procurement intake; the engine mutates
//! lines in exactly two places: receiving appends receipt records against
//! them, and allocation moves `quantity_used_for_repair`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use reloop_core::{PurchaseId, PurchaseLineId, TenantId, WarehouseId};

/// A purchase order - the contract for a supplier delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// Unique purchase order ID.
    pub id: PurchaseId,
    /// Tenant the order belongs to.
    pub tenant_id: TenantId,
    /// Warehouse the delivery is destined for.
    pub warehouse_id: WarehouseId,
    /// Order number, unique within the tenant.
    pub order_no: String,
    /// Supplier display name.
    pub supplier_name: Option<String>,
    /// Supplier contact (email or phone).
    pub supplier_contact: Option<String>,
    /// Expected delivery date.
    pub expected_delivery_date: Option<NaiveDate>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A purchase line - the ordered-quantity contract for one SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLine {
    /// Unique line ID.
    pub id: PurchaseLineId,
    /// Parent purchase order.
    pub purchase_id: PurchaseId,
    /// Stock-keeping unit.
    pub sku: String,
    /// Quantity ordered from the supplier.
    pub quantity_ordered: i32,
    /// Quantity consumed by repair jobs (moved only by allocation).
    pub quantity_used_for_repair: i32,
    /// Agreed unit price.
    pub unit_price: Decimal,
    /// Whether units carry a unique identifier (IMEI/serial).
    pub is_serialized: bool,
    /// Inactive lines are excluded from remaining/allocation computations.
    pub active: bool,
    /// When the line was created.
    pub created_at: DateTime<Utc>,
    /// When the line was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A purchase line joined with its received-quantity sum.
///
/// `received_quantity` is recomputed from the receipt log on every query,
/// never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLineWithReceived {
    /// The line itself.
    pub line: PurchaseLine,
    /// Sum of receipt quantities recorded against the line.
    pub received_quantity: i64,
}

impl PurchaseLineWithReceived {
    /// Raw remaining-to-receive quantity. Negative when the line was
    /// over-received, which the engine allows (and logs).
    #[must_use]
    pub fn remaining_raw(&self) -> i64 {
        i64::from(self.line.quantity_ordered) - self.received_quantity
    }

    /// Remaining-to-receive quantity as downstream consumers see it:
    /// clamped at zero.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.remaining_raw().max(0)
    }

    /// Received-but-unconsumed quantity available to allocation.
    #[must_use]
    pub fn available_for_repair(&self) -> i64 {
        self.received_quantity - i64::from(self.line.quantity_used_for_repair)
    }
}

/// A purchase order with its lines and received quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    /// The order itself.
    pub order: PurchaseOrder,
    /// Active and inactive lines with their received sums.
    pub lines: Vec<PurchaseLineWithReceived>,
}

impl PurchaseOrderDetail {
    /// An order is fully received when the remaining quantities of its
    /// active lines sum to zero or below.
    #[must_use]
    pub fn fully_received(&self) -> bool {
        self.lines
            .iter()
            .filter(|l| l.line.active)
            .map(PurchaseLineWithReceived::remaining_raw)
            .sum::<i64>()
            <= 0
    }
}

/// One row of the paginated purchase order listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderSummary {
    /// The order itself.
    pub order: PurchaseOrder,
    /// Sum of `quantity_ordered` over active lines.
    pub quantity_ordered: i64,
    /// Sum of receipt quantities over active lines.
    pub quantity_received: i64,
}

impl PurchaseOrderSummary {
    /// See [`PurchaseOrderDetail::fully_received`].
    #[must_use]
    pub const fn fully_received(&self) -> bool {
        self.quantity_received >= self.quantity_ordered
    }
}

/// Input for creating a purchase order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseOrder {
    /// Destination warehouse.
    pub warehouse_id: WarehouseId,
    /// Tenant slug used when generating an order number.
    pub tenant_slug: String,
    /// Caller-supplied order number; generated when absent.
    pub order_no: Option<String>,
    /// Supplier display name.
    pub supplier_name: Option<String>,
    /// Supplier contact (email or phone).
    pub supplier_contact: Option<String>,
    /// Expected delivery date.
    pub expected_delivery_date: Option<NaiveDate>,
}

/// Input for creating a purchase line.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPurchaseLine {
    /// Parent purchase order.
    pub purchase_id: PurchaseId,
    /// Stock-keeping unit.
    pub sku: String,
    /// Quantity ordered from the supplier.
    pub quantity_ordered: i32,
    /// Agreed unit price.
    pub unit_price: Decimal,
    /// Whether units carry a unique identifier (IMEI/serial).
    pub is_serialized: bool,
}

/// Filter criteria for listing purchase orders.
#[derive(Debug, Clone, Default)]
pub struct PurchaseFilter {
    /// Filter by destination warehouse.
    pub warehouse_id: Option<WarehouseId>,
    /// Substring match on supplier name.
    pub supplier: Option<String>,
    /// Only fully received (true) or still-open (false) orders.
    pub fully_received: Option<bool>,
    /// Maximum number of results.
    pub limit: Option<i64>,
    /// Number of results to skip.
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ordered: i32, used: i32, active: bool) -> PurchaseLine {
        PurchaseLine {
            id: PurchaseLineId::new(1),
            purchase_id: PurchaseId::new(1),
            sku: "PX-100".to_string(),
            quantity_ordered: ordered,
            quantity_used_for_repair: used,
            unit_price: Decimal::new(2500, 2),
            is_serialized: false,
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_remaining_clamps_at_zero() {
        let with_received = PurchaseLineWithReceived {
            line: line(10, 0, true),
            received_quantity: 12,
        };
        assert_eq!(with_received.remaining_raw(), -2);
        assert_eq!(with_received.remaining(), 0);
    }

    #[test]
    fn test_available_for_repair() {
        let with_received = PurchaseLineWithReceived {
            line: line(10, 3, true),
            received_quantity: 8,
        };
        assert_eq!(with_received.available_for_repair(), 5);
    }

    #[test]
    fn test_fully_received_ignores_inactive_lines() {
        let order = PurchaseOrder {
            id: PurchaseId::new(1),
            tenant_id: TenantId::new(1),
            warehouse_id: WarehouseId::new(1),
            order_no: "acme-20260801-x1".to_string(),
            supplier_name: None,
            supplier_contact: None,
            expected_delivery_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let detail = PurchaseOrderDetail {
            order,
            lines: vec![
                PurchaseLineWithReceived {
                    line: line(5, 0, true),
                    received_quantity: 5,
                },
                // Cancelled line never received; must not keep the order open
                PurchaseLineWithReceived {
                    line: line(5, 0, false),
                    received_quantity: 0,
                },
            ],
        };
        assert!(detail.fully_received());
    }
}
