//! Minimal procurement intake.
//!
//! Purchase orders and lines are normally created by the procurement flow of
//! the operations console; the engine carries just enough intake to own its
//! one intake invariant - order numbers are generated when absent and unique
//! per tenant - and to let tests and tooling seed purchases.

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::PgPool;

use reloop_core::TenantContext;

use crate::db::{self, RepositoryError};
use crate::error::StockError;
use crate::models::{NewPurchaseLine, NewPurchaseOrder, PurchaseLine, PurchaseOrder};

/// How many generated order numbers to try before giving up.
const ORDER_NO_ATTEMPTS: u32 = 3;

/// Creates purchase orders and lines.
#[derive(Debug, Clone)]
pub struct PurchaseIntake {
    pool: PgPool,
}

impl PurchaseIntake {
    /// Create an intake service over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a purchase order.
    ///
    /// When the input carries no order number, one is generated as
    /// tenant-slug + timestamp + random suffix and retried on the (unlikely)
    /// collision; a caller-supplied number that collides is a hard conflict.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Validation` for a blank order number,
    /// `StockError::Conflict` when the number is taken within the tenant,
    /// `StockError::Repository` for database failures.
    #[tracing::instrument(skip(self, ctx, input), fields(tenant = %ctx.tenant_id))]
    pub async fn create_order(
        &self,
        ctx: &TenantContext,
        input: &NewPurchaseOrder,
    ) -> Result<PurchaseOrder, StockError> {
        if let Some(order_no) = &input.order_no {
            let order_no = order_no.trim();
            if order_no.is_empty() {
                return Err(StockError::Validation(
                    "order number cannot be blank".to_string(),
                ));
            }
            return db::purchase::insert_order(&self.pool, ctx.tenant_id, order_no, input)
                .await
                .map_err(into_service_error);
        }

        let mut last_conflict = None;
        for _ in 0..ORDER_NO_ATTEMPTS {
            let order_no = generate_order_no(&input.tenant_slug);
            match db::purchase::insert_order(&self.pool, ctx.tenant_id, &order_no, input).await {
                Ok(order) => return Ok(order),
                Err(RepositoryError::Conflict(message)) => {
                    tracing::warn!(%order_no, "generated order number collided, retrying");
                    last_conflict = Some(message);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(StockError::Conflict(last_conflict.unwrap_or_else(|| {
            "could not generate a unique order number".to_string()
        })))
    }

    /// Add a line to an existing purchase order.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Validation` for a blank SKU or non-positive
    /// quantity, `StockError::NotFound` when the order does not exist for
    /// the tenant, `StockError::Repository` for database failures.
    #[tracing::instrument(skip(self, ctx, input), fields(tenant = %ctx.tenant_id, purchase = %input.purchase_id))]
    pub async fn add_line(
        &self,
        ctx: &TenantContext,
        input: &NewPurchaseLine,
    ) -> Result<PurchaseLine, StockError> {
        if input.sku.trim().is_empty() {
            return Err(StockError::Validation("sku cannot be blank".to_string()));
        }
        if input.quantity_ordered <= 0 {
            return Err(StockError::Validation(format!(
                "ordered quantity {} for sku '{}' must be positive",
                input.quantity_ordered, input.sku
            )));
        }

        db::purchase::find_order(&self.pool, ctx.tenant_id, input.purchase_id)
            .await?
            .ok_or_else(|| {
                StockError::NotFound(format!(
                    "purchase {} for tenant {}",
                    input.purchase_id, ctx.tenant_id
                ))
            })?;

        db::purchase::insert_line(&self.pool, input)
            .await
            .map_err(Into::into)
    }
}

/// Lift repository conflicts to the service taxonomy.
fn into_service_error(err: RepositoryError) -> StockError {
    match err {
        RepositoryError::Conflict(message) => StockError::Conflict(message),
        other => StockError::Repository(other),
    }
}

/// Generate an order number: tenant-slug + timestamp + random suffix.
fn generate_order_no(tenant_slug: &str) -> String {
    let slug: String = tenant_slug
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "po" } else { slug };

    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();

    format!("{slug}-{timestamp}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_order_no_shape() {
        let order_no = generate_order_no("Acme Devices");
        assert!(order_no.starts_with("acme-devices-"));

        let suffix = order_no.rsplit('-').next().expect("suffix");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));

        let timestamp = order_no.rsplit('-').nth(1).expect("timestamp");
        assert_eq!(timestamp.len(), 14);
        assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_order_no_blank_slug_falls_back() {
        let order_no = generate_order_no("  --  ");
        assert!(order_no.starts_with("po-"));
    }

    #[test]
    fn test_generate_order_no_random_suffix_differs() {
        assert_ne!(generate_order_no("acme"), generate_order_no("acme"));
    }
}
