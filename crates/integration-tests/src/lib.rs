//! Integration tests for Reloop.
//!
//! # Running Tests
//!
//! ```bash
//! # Start a PostgreSQL instance and point the tests at it
//! export STOCK_DATABASE_URL=postgres://localhost/reloop_test
//!
//! # Run integration tests (ignored by default)
//! cargo test -p reloop-integration-tests -- --ignored
//! ```
//!
//! Each test mints a fresh random tenant ID, so tests never observe each
//! other's rows even on a shared database. Migrations are applied on first
//! connect and are idempotent.

#![cfg_attr(not(test), forbid(unsafe_code))]

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use reloop_core::{ActorId, TenantContext, WarehouseId};
use reloop_stock::db;
use reloop_stock::models::{
    ConsumptionOrder, NewPurchaseLine, NewPurchaseOrder, PurchaseLine, PurchaseOrder,
};
use reloop_stock::services::{
    AllocationEngine, DeviceIdentityResolver, NullSpecSource, PurchaseIntake, PurchaseQueries,
    ReceiptRecorder,
};

/// Shared state for one integration test: a pool and a fresh tenant.
pub struct TestContext {
    /// Connection pool against the test database.
    pub pool: PgPool,
    /// Context for the minted tenant.
    pub ctx: TenantContext,
    /// Warehouse used by default in this test.
    pub warehouse_id: WarehouseId,
}

impl TestContext {
    /// Connect to `STOCK_DATABASE_URL`, apply migrations, mint a tenant.
    ///
    /// # Panics
    ///
    /// Panics when the database URL is unset or the database is unreachable;
    /// integration tests cannot run without one.
    pub async fn new() -> Self {
        let url = std::env::var("STOCK_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .expect("STOCK_DATABASE_URL must be set for integration tests");

        let pool = db::create_pool(&SecretString::from(url))
            .await
            .expect("failed to connect to test database");

        sqlx::migrate!("../stock/migrations")
            .run(&pool)
            .await
            .expect("failed to apply migrations");

        let tenant_id = unique_id().into();
        Self {
            pool,
            ctx: TenantContext::new(tenant_id, ActorId::new(1)),
            warehouse_id: WarehouseId::new(1),
        }
    }

    /// A receipt recorder with no spec catalog and warehouse 1 fallback.
    #[must_use]
    pub fn recorder(&self) -> ReceiptRecorder<NullSpecSource> {
        ReceiptRecorder::new(
            self.pool.clone(),
            DeviceIdentityResolver::new(NullSpecSource, self.warehouse_id),
        )
    }

    /// An allocation engine with the given consumption order.
    #[must_use]
    pub fn engine(&self, order: ConsumptionOrder) -> AllocationEngine {
        AllocationEngine::new(self.pool.clone(), order)
    }

    /// The read-side query service.
    #[must_use]
    pub fn queries(&self) -> PurchaseQueries {
        PurchaseQueries::new(self.pool.clone())
    }

    /// Seed a purchase order with a generated order number.
    ///
    /// # Panics
    ///
    /// Panics when the insert fails; seeding failures are test bugs.
    pub async fn create_order(&self) -> PurchaseOrder {
        PurchaseIntake::new(self.pool.clone())
            .create_order(
                &self.ctx,
                &NewPurchaseOrder {
                    warehouse_id: self.warehouse_id,
                    tenant_slug: "it-tenant".to_string(),
                    order_no: None,
                    supplier_name: Some("Integration Supplier".to_string()),
                    supplier_contact: None,
                    expected_delivery_date: None,
                },
            )
            .await
            .expect("failed to seed purchase order")
    }

    /// Seed a purchase line.
    ///
    /// # Panics
    ///
    /// Panics when the insert fails; seeding failures are test bugs.
    pub async fn add_line(
        &self,
        order: &PurchaseOrder,
        sku: &str,
        quantity_ordered: i32,
        unit_price: Decimal,
        is_serialized: bool,
    ) -> PurchaseLine {
        PurchaseIntake::new(self.pool.clone())
            .add_line(
                &self.ctx,
                &NewPurchaseLine {
                    purchase_id: order.id,
                    sku: sku.to_string(),
                    quantity_ordered,
                    unit_price,
                    is_serialized,
                },
            )
            .await
            .expect("failed to seed purchase line")
    }
}

/// A SKU that no other test run will collide with.
#[must_use]
pub fn unique_sku(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// A serial-shaped identifier unique across test runs.
#[must_use]
pub fn unique_serial() -> String {
    format!("SN-{}", Uuid::new_v4().simple())
}

/// An IMEI-shaped identifier (15 digits) unique across test runs.
#[must_use]
pub fn unique_imei() -> String {
    let digits: String = Uuid::new_v4()
        .as_u128()
        .to_string()
        .chars()
        .filter(char::is_ascii_digit)
        .take(15)
        .collect();
    format!("{digits:0>15}")
}

/// A random positive i32 for minting tenants.
fn unique_id() -> i32 {
    let modulo = Uuid::new_v4().as_u128() % 2_000_000_000;
    i32::try_from(modulo).expect("value below i32::MAX") + 1
}
