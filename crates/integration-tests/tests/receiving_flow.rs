//! Integration tests for purchase receiving.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - `STOCK_DATABASE_URL` pointing at it
//!
//! Run with: cargo test -p reloop-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use reloop_integration_tests::{TestContext, unique_imei, unique_serial, unique_sku};
use reloop_stock::StockError;
use reloop_stock::models::{ReceiveItem, ReceiveRequest};

// ============================================================================
// Bulk receiving
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_bulk_receive_full_quantity() {
    let t = TestContext::new().await;
    let order = t.create_order().await;
    let sku = unique_sku("PART");
    let line = t
        .add_line(&order, &sku, 10, Decimal::new(2500, 2), false)
        .await;

    let summary = t
        .recorder()
        .receive(
            &t.ctx,
            &ReceiveRequest {
                purchase_id: order.id,
                warehouse_id: t.warehouse_id,
                items: vec![ReceiveItem::Bulk {
                    purchase_line_id: line.id,
                    sku: sku.clone(),
                    quantity: 10,
                }],
            },
        )
        .await
        .expect("receive failed");

    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].quantity, 10);
    assert_eq!(summary.records[0].device_id, None);
    assert_eq!(summary.devices_created, 0);
    assert!(summary.over_received.is_empty());

    let remaining = t
        .queries()
        .remaining_for_line(&t.ctx, line.id)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    // First receipt created the ledger row and moved its cache
    let ledger = t
        .queries()
        .stock_on_hand(&t.ctx, t.warehouse_id, &sku)
        .await
        .unwrap()
        .expect("ledger row should exist after first receipt");
    assert_eq!(ledger.quantity, 10);
    assert!(ledger.is_part);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_over_receive_allowed_and_reported() {
    let t = TestContext::new().await;
    let order = t.create_order().await;
    let sku = unique_sku("PART");
    let line = t
        .add_line(&order, &sku, 5, Decimal::new(1000, 2), false)
        .await;

    let summary = t
        .recorder()
        .receive(
            &t.ctx,
            &ReceiveRequest {
                purchase_id: order.id,
                warehouse_id: t.warehouse_id,
                items: vec![ReceiveItem::Bulk {
                    purchase_line_id: line.id,
                    sku: sku.clone(),
                    quantity: 8,
                }],
            },
        )
        .await
        .expect("over-receiving must not fail");

    assert_eq!(summary.over_received.len(), 1);
    assert_eq!(summary.over_received[0].received_quantity, 8);

    // Downstream consumers never see a negative remaining quantity
    let remaining = t
        .queries()
        .remaining_for_line(&t.ctx, line.id)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

// ============================================================================
// Serialized receiving
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_serialized_receive_creates_devices() {
    let t = TestContext::new().await;
    let order = t.create_order().await;
    let sku = unique_sku("PHONE");
    let line = t
        .add_line(&order, &sku, 3, Decimal::new(19900, 2), true)
        .await;

    let imei = unique_imei();
    let serial = unique_serial();
    let summary = t
        .recorder()
        .receive(
            &t.ctx,
            &ReceiveRequest {
                purchase_id: order.id,
                warehouse_id: t.warehouse_id,
                items: vec![ReceiveItem::Serialized {
                    purchase_line_id: line.id,
                    sku: sku.clone(),
                    identifiers: vec![imei.clone(), serial.clone()],
                }],
            },
        )
        .await
        .expect("receive failed");

    assert_eq!(summary.records.len(), 2);
    assert!(summary.records.iter().all(|r| r.quantity == 1));
    assert!(summary.records.iter().all(|r| r.device_id.is_some()));
    assert_eq!(summary.devices_created, 2);

    let remaining = t
        .queries()
        .remaining_for_line(&t.ctx, line.id)
        .await
        .unwrap();
    assert_eq!(remaining, 1);

    // The IMEI-shaped identifier landed in the imei column, the other in
    // serial_no
    let (imei_count, serial_count): (i64, i64) = sqlx::query_as(
        "SELECT
            (SELECT COUNT(*) FROM device WHERE tenant_id = $1 AND imei = $2),
            (SELECT COUNT(*) FROM device WHERE tenant_id = $1 AND serial_no = $3)",
    )
    .bind(t.ctx.tenant_id)
    .bind(&imei)
    .bind(&serial)
    .fetch_one(&t.pool)
    .await
    .unwrap();
    assert_eq!(imei_count, 1);
    assert_eq!(serial_count, 1);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_rescanning_identifier_resolves_same_device() {
    let t = TestContext::new().await;
    let order = t.create_order().await;
    let sku = unique_sku("PHONE");
    let line_a = t
        .add_line(&order, &sku, 2, Decimal::new(19900, 2), true)
        .await;
    let line_b = t
        .add_line(&order, &sku, 2, Decimal::new(19900, 2), true)
        .await;

    let imei = unique_imei();
    let first = t
        .recorder()
        .receive(
            &t.ctx,
            &ReceiveRequest {
                purchase_id: order.id,
                warehouse_id: t.warehouse_id,
                items: vec![ReceiveItem::Serialized {
                    purchase_line_id: line_a.id,
                    sku: sku.clone(),
                    identifiers: vec![imei.clone()],
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(first.devices_created, 1);

    let second = t
        .recorder()
        .receive(
            &t.ctx,
            &ReceiveRequest {
                purchase_id: order.id,
                warehouse_id: t.warehouse_id,
                items: vec![ReceiveItem::Serialized {
                    purchase_line_id: line_b.id,
                    sku: sku.clone(),
                    identifiers: vec![imei.clone()],
                }],
            },
        )
        .await
        .unwrap();

    // Same identifier, same device: nothing new created
    assert_eq!(second.devices_created, 0);
    assert_eq!(
        first.records[0].device_id.unwrap(),
        second.records[0].device_id.unwrap()
    );

    let device_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM device WHERE tenant_id = $1 AND imei = $2")
            .bind(t.ctx.tenant_id)
            .bind(&imei)
            .fetch_one(&t.pool)
            .await
            .unwrap();
    assert_eq!(device_count, 1);
}

// ============================================================================
// Transactionality
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_failed_item_rolls_back_whole_receive() {
    let t = TestContext::new().await;
    let order = t.create_order().await;
    let bulk_sku = unique_sku("PART");
    let serialized_sku = unique_sku("PHONE");
    let bulk_line = t
        .add_line(&order, &bulk_sku, 10, Decimal::new(500, 2), false)
        .await;
    let serialized_line = t
        .add_line(&order, &serialized_sku, 2, Decimal::new(19900, 2), true)
        .await;

    // Second item is invalid: bulk quantity against a serialized line
    let err = t
        .recorder()
        .receive(
            &t.ctx,
            &ReceiveRequest {
                purchase_id: order.id,
                warehouse_id: t.warehouse_id,
                items: vec![
                    ReceiveItem::Bulk {
                        purchase_line_id: bulk_line.id,
                        sku: bulk_sku.clone(),
                        quantity: 10,
                    },
                    ReceiveItem::Bulk {
                        purchase_line_id: serialized_line.id,
                        sku: serialized_sku.clone(),
                        quantity: 2,
                    },
                ],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::Validation(_)));

    // The valid first item must not have persisted anything
    let remaining = t
        .queries()
        .remaining_for_line(&t.ctx, bulk_line.id)
        .await
        .unwrap();
    assert_eq!(remaining, 10);

    let log = t.queries().receipt_log(&t.ctx, order.id).await.unwrap();
    assert!(log.is_empty());

    let ledger = t
        .queries()
        .stock_on_hand(&t.ctx, t.warehouse_id, &bulk_sku)
        .await
        .unwrap();
    assert!(ledger.is_none());
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_receive_unknown_purchase_is_not_found() {
    let t = TestContext::new().await;

    let err = t
        .recorder()
        .receive(
            &t.ctx,
            &ReceiveRequest {
                purchase_id: reloop_core::PurchaseId::new(i32::MAX),
                warehouse_id: t.warehouse_id,
                items: vec![ReceiveItem::Bulk {
                    purchase_line_id: reloop_core::PurchaseLineId::new(i32::MAX),
                    sku: "ghost".to_string(),
                    quantity: 1,
                }],
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StockError::NotFound(_)));
}
