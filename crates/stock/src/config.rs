//! Stock engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOCK_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   the generic `DATABASE_URL`)
//!
//! ## Optional
//! - `STOCK_DEFAULT_WAREHOUSE_ID` - Warehouse assigned to newly discovered
//!   devices when the receiving call supplies none (default: 1)
//! - `STOCK_CONSUMPTION_ORDER` - Batch consumption policy for allocation:
//!   `fifo` (oldest batch first, default) or `lifo` (newest batch first)

use secrecy::SecretString;
use thiserror::Error;

use reloop_core::WarehouseId;

use crate::models::ConsumptionOrder;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Stock engine configuration.
#[derive(Debug, Clone)]
pub struct StockConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Fallback warehouse for devices created without an explicit warehouse
    pub default_warehouse_id: WarehouseId,
    /// Batch consumption policy used by the allocation engine
    pub consumption_order: ConsumptionOrder,
}

impl StockConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOCK_DATABASE_URL")?;

        let default_warehouse_id = get_env_or_default("STOCK_DEFAULT_WAREHOUSE_ID", "1")
            .parse::<i32>()
            .map(WarehouseId::new)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOCK_DEFAULT_WAREHOUSE_ID".to_string(), e.to_string())
            })?;

        let consumption_order = get_env_or_default("STOCK_CONSUMPTION_ORDER", "fifo")
            .parse::<ConsumptionOrder>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOCK_CONSUMPTION_ORDER".to_string(), e.to_string())
            })?;

        Ok(Self {
            database_url,
            default_warehouse_id,
            consumption_order,
        })
    }
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOCK_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_consumption_order_parse() {
        assert_eq!(
            "fifo".parse::<ConsumptionOrder>().unwrap(),
            ConsumptionOrder::Fifo
        );
        assert_eq!(
            "LIFO".parse::<ConsumptionOrder>().unwrap(),
            ConsumptionOrder::Lifo
        );
        assert!("newest-ish".parse::<ConsumptionOrder>().is_err());
    }

    #[test]
    fn test_get_env_or_default_missing() {
        assert_eq!(
            get_env_or_default("STOCK_TEST_UNSET_VARIABLE", "fallback"),
            "fallback"
        );
    }
}
