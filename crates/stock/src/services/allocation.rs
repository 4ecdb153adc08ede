//! Batch allocation of received stock to repair consumption.
//!
//! Allocation draws received-but-unconsumed quantity from purchase lines
//! ("batches") and records the draw on `quantity_used_for_repair`. Draws are
//! reversible: `deallocate` with the allocation list returns the quantity.
//!
//! Candidate lines are locked `FOR UPDATE` before availability is read, so
//! two allocations against the same SKU serialize instead of both reading
//! the same availability snapshot and overdrawing a batch.

use rust_decimal::Decimal;
use sqlx::PgPool;

use reloop_core::{TenantContext, WarehouseId};

use crate::db::{self, RepositoryError};
use crate::error::StockError;
use crate::models::{Allocation, AllocationOutcome, BatchSnapshot, ConsumptionOrder};

/// Allocates received batches to repair jobs and reverses those draws.
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    pool: PgPool,
    order: ConsumptionOrder,
}

impl AllocationEngine {
    /// Create an engine over the given pool with a fixed consumption order.
    pub const fn new(pool: PgPool, order: ConsumptionOrder) -> Self {
        Self { pool, order }
    }

    /// Allocate up to `quantity_needed` units of a SKU from received batches.
    ///
    /// Returns the per-batch draws with their unit prices so the caller can
    /// attribute repair cost. `total_allocated` may be less than requested
    /// when stock is short - that is a valid outcome, not an error; check
    /// [`AllocationOutcome::is_partial`].
    ///
    /// # Errors
    ///
    /// Returns `StockError::Validation` for a non-positive quantity,
    /// `StockError::Repository` for database failures.
    #[tracing::instrument(skip(self, ctx), fields(tenant = %ctx.tenant_id))]
    pub async fn allocate(
        &self,
        ctx: &TenantContext,
        warehouse_id: WarehouseId,
        sku: &str,
        quantity_needed: i32,
    ) -> Result<AllocationOutcome, StockError> {
        if quantity_needed <= 0 {
            return Err(StockError::Validation(format!(
                "allocation quantity {quantity_needed} for sku '{sku}' must be positive"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let line_ids =
            db::purchase::lock_batches(&mut *tx, ctx.tenant_id, warehouse_id, sku).await?;

        let allocations = if line_ids.is_empty() {
            Vec::new()
        } else {
            let batches = db::purchase::batch_snapshots(&mut *tx, &line_ids, self.order).await?;
            plan_allocation(&batches, quantity_needed)
        };

        let mut total_allocated = 0_i32;
        for allocation in &allocations {
            db::purchase::add_repair_consumption(
                &mut *tx,
                allocation.purchase_line_id,
                allocation.quantity,
            )
            .await?;
            total_allocated += allocation.quantity;
        }

        if total_allocated > 0 {
            db::stock_ledger::adjust_quantity(
                &mut *tx,
                ctx.tenant_id,
                warehouse_id,
                sku,
                -i64::from(total_allocated),
            )
            .await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        if total_allocated < quantity_needed {
            tracing::info!(
                sku,
                quantity_needed,
                total_allocated,
                "allocation partially satisfied"
            );
        }

        Ok(AllocationOutcome {
            total_allocated,
            allocations,
        })
    }

    /// Reverse a previous allocation, batch by batch.
    ///
    /// The inverse of [`Self::allocate`]: decrements each line's
    /// `quantity_used_for_repair` and returns the quantity to the ledger
    /// cache, all in one transaction. A decrement that would drive a line's
    /// consumption negative rejects the whole call.
    ///
    /// # Errors
    ///
    /// - `StockError::Validation` for non-positive quantities or a decrement
    ///   below zero
    /// - `StockError::NotFound` when a line does not exist for the tenant
    /// - `StockError::Repository` for database failures
    #[tracing::instrument(skip(self, ctx, allocations), fields(tenant = %ctx.tenant_id, batches = allocations.len()))]
    pub async fn deallocate(
        &self,
        ctx: &TenantContext,
        allocations: &[Allocation],
    ) -> Result<(), StockError> {
        if allocations.is_empty() {
            return Ok(());
        }
        for allocation in allocations {
            if allocation.quantity <= 0 {
                return Err(StockError::Validation(format!(
                    "deallocation quantity {} for line {} must be positive",
                    allocation.quantity, allocation.purchase_line_id
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        for allocation in allocations {
            let (sku, warehouse_id) =
                db::purchase::line_context(&mut *tx, ctx.tenant_id, allocation.purchase_line_id)
                    .await?
                    .ok_or_else(|| {
                        StockError::NotFound(format!(
                            "purchase line {} for tenant {}",
                            allocation.purchase_line_id, ctx.tenant_id
                        ))
                    })?;

            let decremented = db::purchase::remove_repair_consumption(
                &mut *tx,
                ctx.tenant_id,
                allocation.purchase_line_id,
                allocation.quantity,
            )
            .await?;
            if !decremented {
                return Err(StockError::Validation(format!(
                    "deallocating {} units of '{sku}' from line {} would drive repair consumption negative",
                    allocation.quantity, allocation.purchase_line_id
                )));
            }

            db::stock_ledger::adjust_quantity(
                &mut *tx,
                ctx.tenant_id,
                warehouse_id,
                &sku,
                i64::from(allocation.quantity),
            )
            .await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }
}

/// Plan which batches to draw from, in the order given.
///
/// Pure: takes the locked availability snapshots and the needed quantity,
/// returns the draws. Never draws beyond a batch's availability and never
/// plans more than `quantity_needed` in total.
#[must_use]
pub fn plan_allocation(batches: &[BatchSnapshot], quantity_needed: i32) -> Vec<Allocation> {
    let mut remaining = quantity_needed;
    let mut allocations = Vec::new();

    for batch in batches {
        if remaining <= 0 {
            break;
        }

        let available = i32::try_from(batch.available().max(0)).unwrap_or(i32::MAX);
        let take = remaining.min(available);
        if take > 0 {
            allocations.push(Allocation {
                purchase_line_id: batch.purchase_line_id,
                quantity: take,
                unit_price: batch.unit_price,
            });
            remaining -= take;
        }
    }

    allocations
}

/// Weighted-average unit cost of an allocation list, for repair cost
/// attribution. `None` when the list allocates nothing.
#[must_use]
pub fn weighted_average_unit_cost(allocations: &[Allocation]) -> Option<Decimal> {
    let total_units: i64 = allocations.iter().map(|a| i64::from(a.quantity)).sum();
    if total_units <= 0 {
        return None;
    }

    let total_cost: Decimal = allocations
        .iter()
        .map(|a| a.unit_price * Decimal::from(a.quantity))
        .sum();

    Some(total_cost / Decimal::from(total_units))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use reloop_core::PurchaseLineId;

    use super::*;

    fn batch(id: i32, received: i64, used: i32, price: Decimal) -> BatchSnapshot {
        BatchSnapshot {
            purchase_line_id: PurchaseLineId::new(id),
            unit_price: price,
            received_quantity: received,
            quantity_used_for_repair: used,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_draws_in_given_order() {
        // Snapshots arrive pre-sorted by the consumption policy; newest
        // first here, so the draw must exhaust batch 2 before touching 1.
        let batches = vec![
            batch(2, 5, 0, Decimal::new(900, 2)),
            batch(1, 5, 0, Decimal::new(1100, 2)),
        ];
        let plan = plan_allocation(&batches, 7);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].purchase_line_id, PurchaseLineId::new(2));
        assert_eq!(plan[0].quantity, 5);
        assert_eq!(plan[1].purchase_line_id, PurchaseLineId::new(1));
        assert_eq!(plan[1].quantity, 2);
    }

    #[test]
    fn test_plan_respects_availability() {
        let batches = vec![batch(1, 10, 7, Decimal::new(500, 2))];
        let plan = plan_allocation(&batches, 100);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].quantity, 3);
    }

    #[test]
    fn test_plan_never_exceeds_needed() {
        let batches = vec![
            batch(1, 50, 0, Decimal::new(500, 2)),
            batch(2, 50, 0, Decimal::new(500, 2)),
        ];
        let plan = plan_allocation(&batches, 4);

        let total: i32 = plan.iter().map(|a| a.quantity).sum();
        assert_eq!(total, 4);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_plan_partial_when_stock_short() {
        let batches = vec![
            batch(1, 5, 0, Decimal::new(500, 2)),
            batch(2, 5, 0, Decimal::new(500, 2)),
        ];
        let plan = plan_allocation(&batches, 100);

        let total: i32 = plan.iter().map(|a| a.quantity).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_plan_skips_exhausted_and_overdrawn_batches() {
        let batches = vec![
            batch(1, 5, 5, Decimal::new(500, 2)),
            // Over-consumed batch (bad data) must count as zero, not negative
            batch(2, 3, 4, Decimal::new(500, 2)),
            batch(3, 2, 0, Decimal::new(500, 2)),
        ];
        let plan = plan_allocation(&batches, 4);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].purchase_line_id, PurchaseLineId::new(3));
        assert_eq!(plan[0].quantity, 2);
    }

    #[test]
    fn test_plan_zero_batches() {
        assert!(plan_allocation(&[], 5).is_empty());
    }

    #[test]
    fn test_weighted_average_unit_cost() {
        let allocations = vec![
            Allocation {
                purchase_line_id: PurchaseLineId::new(1),
                quantity: 3,
                unit_price: Decimal::new(1000, 2), // 10.00
            },
            Allocation {
                purchase_line_id: PurchaseLineId::new(2),
                quantity: 1,
                unit_price: Decimal::new(2000, 2), // 20.00
            },
        ];

        // (3 * 10 + 1 * 20) / 4 = 12.50
        let avg = weighted_average_unit_cost(&allocations).unwrap();
        assert_eq!(avg, Decimal::new(1250, 2));
    }

    #[test]
    fn test_weighted_average_empty() {
        assert!(weighted_average_unit_cost(&[]).is_none());
    }
}
