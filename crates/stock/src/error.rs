//! Unified error handling for the stock engine.

use thiserror::Error;

use crate::db::RepositoryError;

/// Service-level error type for engine operations.
///
/// A partial allocation is NOT an error: `allocate` reports
/// `total_allocated < quantity_needed` through its outcome and the caller
/// must check it explicitly.
///
/// Messages carry the failing SKU and identifier where one exists, so the
/// controller layer can tell the operator which scanned unit broke a
/// multi-item receipt.
#[derive(Debug, Error)]
pub enum StockError {
    /// Database operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Referenced purchase, line, or device does not exist for the tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation not resolved by the race-tolerant fallback.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Non-positive quantities, malformed identifiers, missing fields.
    #[error("validation failure: {0}")]
    Validation(String),

    /// An optional upstream capability (SKU spec catalog) failed.
    ///
    /// Device resolution degrades on this instead of propagating it; it only
    /// surfaces to callers of the capability itself.
    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

impl From<reloop_core::IdentifierError> for StockError {
    fn from(err: reloop_core::IdentifierError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockError::NotFound("purchase line 17 for sku PX-100".to_string());
        assert_eq!(err.to_string(), "not found: purchase line 17 for sku PX-100");

        let err = StockError::Validation("quantity must be positive".to_string());
        assert_eq!(err.to_string(), "validation failure: quantity must be positive");
    }

    #[test]
    fn test_identifier_error_maps_to_validation() {
        let err: StockError = reloop_core::UnitIdentifier::classify("")
            .unwrap_err()
            .into();
        assert!(matches!(err, StockError::Validation(_)));
    }
}
