//! Reloop Stock - Purchase receiving and inventory allocation engine.
//!
//! This crate owns the one subsystem of the Reloop platform with real
//! consistency requirements: tracking ordered vs. received quantities per
//! purchase line, resolving unit-level device identity (IMEI/serial) during
//! receipt, maintaining per-warehouse stock aggregates, and allocating
//! received batches to repair-part consumption with reversible holds.
//!
//! # Architecture
//!
//! - [`db`] - sqlx/`PostgreSQL` repositories, composable over transactions
//! - [`models`] - domain records and operation inputs/outputs
//! - [`services`] - the engine operations: [`services::ReceiptRecorder`],
//!   [`services::DeviceIdentityResolver`], [`services::AllocationEngine`],
//!   [`services::PurchaseIntake`], [`services::PurchaseQueries`]
//!
//! Callers (an HTTP controller layer, the CLI) construct the services with a
//! [`sqlx::PgPool`] and pass a [`reloop_core::TenantContext`] per call; the
//! authentication middleware that produces that context lives upstream.
//!
//! # Consistency model
//!
//! Every `receive`, `allocate`, and `deallocate` call runs inside one
//! database transaction. Allocation locks its candidate purchase lines with
//! `SELECT ... FOR UPDATE` before computing availability, so concurrent
//! allocations against the same SKU serialize instead of overdrawing a
//! batch. Receipt records and device rows are write-once.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::StockConfig;
pub use error::StockError;
