//! Reloop Core - Shared types library.
//!
//! This crate provides common types used across all Reloop components:
//! - `stock` - Purchase receiving and inventory allocation engine
//! - `cli` - Command-line tools for migrations and maintenance jobs
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, the IMEI/serial
//!   identifier classifier, and the per-request tenant context

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
