//! Core types for Reloop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod context;
pub mod id;
pub mod identifier;

pub use context::TenantContext;
pub use id::*;
pub use identifier::{IdentifierError, UnitIdentifier};
