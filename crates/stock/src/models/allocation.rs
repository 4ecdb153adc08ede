//! Allocation domain models and the batch consumption policy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use reloop_core::PurchaseLineId;

/// Which end of the batch history allocation consumes from.
///
/// One policy per engine instance, chosen in configuration. The default is
/// FIFO (oldest batch first); LIFO is retained as a selectable policy for
/// tenants that cost repairs against their latest purchase prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumptionOrder {
    /// Oldest batch first.
    Fifo,
    /// Newest batch first.
    Lifo,
}

impl Default for ConsumptionOrder {
    fn default() -> Self {
        Self::Fifo
    }
}

/// Error returned when parsing a [`ConsumptionOrder`] from a string.
#[derive(Debug, thiserror::Error)]
#[error("unknown consumption order '{0}', expected 'fifo' or 'lifo'")]
pub struct ParseConsumptionOrderError(String);

impl std::str::FromStr for ConsumptionOrder {
    type Err = ParseConsumptionOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lifo" => Ok(Self::Lifo),
            _ => Err(ParseConsumptionOrderError(s.to_string())),
        }
    }
}

/// A reversible assignment of received quantity from one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// Batch (purchase line) the quantity was drawn from.
    pub purchase_line_id: PurchaseLineId,
    /// Units drawn.
    pub quantity: i32,
    /// The batch's unit price, for cost attribution.
    pub unit_price: Decimal,
}

/// Result of an allocation call.
///
/// `total_allocated < quantity_needed` is a valid partial outcome, not an
/// error; callers must check it explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutcome {
    /// Units actually allocated.
    pub total_allocated: i32,
    /// Per-batch draws, in consumption order.
    pub allocations: Vec<Allocation>,
}

impl AllocationOutcome {
    /// Whether the engine could not satisfy the full requested quantity.
    #[must_use]
    pub const fn is_partial(&self, quantity_needed: i32) -> bool {
        self.total_allocated < quantity_needed
    }
}

/// A locked snapshot of one batch's availability during allocation.
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    /// Batch (purchase line) ID.
    pub purchase_line_id: PurchaseLineId,
    /// The batch's unit price.
    pub unit_price: Decimal,
    /// Sum of receipt quantities recorded against the batch.
    pub received_quantity: i64,
    /// Quantity already consumed by repair jobs.
    pub quantity_used_for_repair: i32,
    /// Batch creation time; drives the consumption order.
    pub created_at: DateTime<Utc>,
}

impl BatchSnapshot {
    /// Received-but-unconsumed quantity.
    #[must_use]
    pub fn available(&self) -> i64 {
        self.received_quantity - i64::from(self.quantity_used_for_repair)
    }
}
