//! Engine operations built on the repository layer.
//!
//! Each service owns a [`sqlx::PgPool`] and runs every mutating operation
//! inside one transaction; the repositories compose onto that transaction.

pub mod allocation;
pub mod identity;
pub mod intake;
pub mod query;
pub mod receiving;

pub use allocation::{AllocationEngine, plan_allocation, weighted_average_unit_cost};
pub use identity::{DeviceIdentityResolver, NullSpecSource, PgSpecCatalog, SkuSpecSource};
pub use intake::PurchaseIntake;
pub use query::PurchaseQueries;
pub use receiving::ReceiptRecorder;
