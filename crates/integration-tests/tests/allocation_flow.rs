//! Integration tests for batch allocation and deallocation.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - `STOCK_DATABASE_URL` pointing at it
//!
//! Run with: cargo test -p reloop-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use reloop_integration_tests::{TestContext, unique_sku};
use reloop_stock::StockError;
use reloop_stock::db;
use reloop_stock::models::{Allocation, ConsumptionOrder, PurchaseLine, ReceiveItem, ReceiveRequest};

/// Seed two received batches of the same SKU: 5 units on an older line and
/// 5 on a newer one. Returns (sku, older line, newer line).
async fn seed_two_batches(t: &TestContext) -> (String, PurchaseLine, PurchaseLine) {
    let order = t.create_order().await;
    let sku = unique_sku("SCREEN");
    let older = t
        .add_line(&order, &sku, 5, Decimal::new(1000, 2), false)
        .await;
    let newer = t
        .add_line(&order, &sku, 5, Decimal::new(1200, 2), false)
        .await;

    for line in [&older, &newer] {
        t.recorder()
            .receive(
                &t.ctx,
                &ReceiveRequest {
                    purchase_id: order.id,
                    warehouse_id: t.warehouse_id,
                    items: vec![ReceiveItem::Bulk {
                        purchase_line_id: line.id,
                        sku: sku.clone(),
                        quantity: 5,
                    }],
                },
            )
            .await
            .expect("seed receive failed");
    }

    (sku, older, newer)
}

// ============================================================================
// Consumption order
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_lifo_draws_newest_batch_first() {
    let t = TestContext::new().await;
    let (sku, older, newer) = seed_two_batches(&t).await;

    let outcome = t
        .engine(ConsumptionOrder::Lifo)
        .allocate(&t.ctx, t.warehouse_id, &sku, 7)
        .await
        .unwrap();

    assert_eq!(outcome.total_allocated, 7);
    assert_eq!(outcome.allocations.len(), 2);
    assert_eq!(outcome.allocations[0].purchase_line_id, newer.id);
    assert_eq!(outcome.allocations[0].quantity, 5);
    assert_eq!(outcome.allocations[1].purchase_line_id, older.id);
    assert_eq!(outcome.allocations[1].quantity, 2);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_fifo_draws_oldest_batch_first() {
    let t = TestContext::new().await;
    let (sku, older, newer) = seed_two_batches(&t).await;

    let outcome = t
        .engine(ConsumptionOrder::Fifo)
        .allocate(&t.ctx, t.warehouse_id, &sku, 7)
        .await
        .unwrap();

    assert_eq!(outcome.total_allocated, 7);
    assert_eq!(outcome.allocations[0].purchase_line_id, older.id);
    assert_eq!(outcome.allocations[0].quantity, 5);
    assert_eq!(outcome.allocations[1].purchase_line_id, newer.id);
    assert_eq!(outcome.allocations[1].quantity, 2);
}

// ============================================================================
// Partial allocation
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_insufficient_stock_allocates_partially() {
    let t = TestContext::new().await;
    let (sku, _, _) = seed_two_batches(&t).await;

    let outcome = t
        .engine(ConsumptionOrder::Fifo)
        .allocate(&t.ctx, t.warehouse_id, &sku, 100)
        .await
        .expect("partial allocation is not an error");

    assert_eq!(outcome.total_allocated, 10);
    assert!(outcome.is_partial(100));
    let planned: i32 = outcome.allocations.iter().map(|a| a.quantity).sum();
    assert_eq!(planned, 10);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_allocate_unknown_sku_yields_zero() {
    let t = TestContext::new().await;

    let outcome = t
        .engine(ConsumptionOrder::Fifo)
        .allocate(&t.ctx, t.warehouse_id, &unique_sku("GHOST"), 3)
        .await
        .unwrap();

    assert_eq!(outcome.total_allocated, 0);
    assert!(outcome.allocations.is_empty());
}

// ============================================================================
// Deallocation
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_allocate_deallocate_round_trip() {
    let t = TestContext::new().await;
    let (sku, older, _newer) = seed_two_batches(&t).await;
    let engine = t.engine(ConsumptionOrder::Fifo);

    let outcome = engine
        .allocate(&t.ctx, t.warehouse_id, &sku, 7)
        .await
        .unwrap();
    engine
        .deallocate(&t.ctx, &outcome.allocations)
        .await
        .expect("deallocate failed");

    // Every line's repair consumption is back at its pre-allocation value
    let detail = t
        .queries()
        .order_detail(&t.ctx, older.purchase_id)
        .await
        .unwrap();
    for line in detail.lines {
        assert_eq!(
            line.line.quantity_used_for_repair, 0,
            "line {} not restored",
            line.line.id
        );
    }

    // And the ledger cache is back at the received total
    let ledger = t
        .queries()
        .stock_on_hand(&t.ctx, t.warehouse_id, &sku)
        .await
        .unwrap()
        .expect("ledger row exists");
    assert_eq!(ledger.quantity, 10);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_deallocate_below_zero_is_rejected() {
    let t = TestContext::new().await;
    let (sku, older, _) = seed_two_batches(&t).await;

    let err = t
        .engine(ConsumptionOrder::Fifo)
        .deallocate(
            &t.ctx,
            &[Allocation {
                purchase_line_id: older.id,
                quantity: 3,
                unit_price: Decimal::new(1000, 2),
            }],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StockError::Validation(_)));

    // The rejected call must not have touched the ledger either
    let ledger = t
        .queries()
        .stock_on_hand(&t.ctx, t.warehouse_id, &sku)
        .await
        .unwrap()
        .expect("ledger row exists");
    assert_eq!(ledger.quantity, 10);
}

// ============================================================================
// Ledger reconcile
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_reconcile_repairs_drifted_ledger() {
    let t = TestContext::new().await;
    let (sku, _, _) = seed_two_batches(&t).await;

    t.engine(ConsumptionOrder::Fifo)
        .allocate(&t.ctx, t.warehouse_id, &sku, 4)
        .await
        .unwrap();

    // Simulate drift from manual data surgery
    sqlx::query("UPDATE stock_ledger SET quantity = 999 WHERE tenant_id = $1 AND sku = $2")
        .bind(t.ctx.tenant_id)
        .bind(&sku)
        .execute(&t.pool)
        .await
        .unwrap();

    let mut conn = t.pool.acquire().await.unwrap();
    let corrected = db::stock_ledger::reconcile(&mut conn, Some(t.ctx.tenant_id))
        .await
        .unwrap();
    assert!(corrected >= 1);

    let ledger = t
        .queries()
        .stock_on_hand(&t.ctx, t.warehouse_id, &sku)
        .await
        .unwrap()
        .expect("ledger row exists");
    assert_eq!(ledger.quantity, 6); // 10 received - 4 allocated
}
