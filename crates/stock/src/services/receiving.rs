//! Purchase receiving.
//!
//! One `receive` call is one delivery hitting the dock: a mix of bulk part
//! quantities and scanned serialized units, all against lines of a single
//! purchase order. The whole call commits or rolls back as one transaction -
//! a bad identifier in the middle of a pallet leaves no partial state.

use sqlx::PgPool;

use reloop_core::{PurchaseLineId, TenantContext, UnitIdentifier};

use crate::db::{self, RepositoryError, receipt::NewReceipt};
use crate::error::StockError;
use crate::models::{OverReceipt, ReceiveItem, ReceiveRequest, ReceiveSummary};

use super::identity::{DeviceIdentityResolver, SkuSpecSource};

/// Records deliveries against purchase orders.
#[derive(Debug, Clone)]
pub struct ReceiptRecorder<S> {
    pool: PgPool,
    resolver: DeviceIdentityResolver<S>,
}

/// A receive item with its identifiers classified, ready to persist.
#[derive(Debug)]
enum PreparedItem<'a> {
    Bulk {
        purchase_line_id: PurchaseLineId,
        sku: &'a str,
        quantity: i32,
    },
    Serialized {
        purchase_line_id: PurchaseLineId,
        sku: &'a str,
        identifiers: Vec<UnitIdentifier>,
    },
}

impl PreparedItem<'_> {
    const fn purchase_line_id(&self) -> PurchaseLineId {
        match self {
            Self::Bulk {
                purchase_line_id, ..
            }
            | Self::Serialized {
                purchase_line_id, ..
            } => *purchase_line_id,
        }
    }

    const fn sku(&self) -> &str {
        match self {
            Self::Bulk { sku, .. } | Self::Serialized { sku, .. } => sku,
        }
    }
}

/// Validate and classify a receiving request before touching the database.
fn prepare_items(items: &[ReceiveItem]) -> Result<Vec<PreparedItem<'_>>, StockError> {
    if items.is_empty() {
        return Err(StockError::Validation(
            "receiving request has no items".to_string(),
        ));
    }

    items
        .iter()
        .map(|item| match item {
            ReceiveItem::Bulk {
                purchase_line_id,
                sku,
                quantity,
            } => {
                if *quantity <= 0 {
                    return Err(StockError::Validation(format!(
                        "quantity {quantity} for sku '{sku}' must be positive"
                    )));
                }
                Ok(PreparedItem::Bulk {
                    purchase_line_id: *purchase_line_id,
                    sku,
                    quantity: *quantity,
                })
            }
            ReceiveItem::Serialized {
                purchase_line_id,
                sku,
                identifiers,
            } => {
                if identifiers.is_empty() {
                    return Err(StockError::Validation(format!(
                        "no identifiers supplied for sku '{sku}'"
                    )));
                }
                let classified = identifiers
                    .iter()
                    .map(|raw| {
                        UnitIdentifier::classify(raw).map_err(|e| {
                            StockError::Validation(format!(
                                "identifier '{raw}' for sku '{sku}': {e}"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PreparedItem::Serialized {
                    purchase_line_id: *purchase_line_id,
                    sku,
                    identifiers: classified,
                })
            }
        })
        .collect()
}

impl<S: SkuSpecSource> ReceiptRecorder<S> {
    /// Create a recorder over the given pool and resolver.
    pub const fn new(pool: PgPool, resolver: DeviceIdentityResolver<S>) -> Self {
        Self { pool, resolver }
    }

    /// Record a delivery.
    ///
    /// Writes, all in one transaction: receipt records (one per bulk item,
    /// one per scanned identifier), device rows for identifiers seen for the
    /// first time, lazily created stock ledger rows, ledger membership links
    /// for serialized units, and the ledger quantity cache.
    ///
    /// Receiving beyond a line's ordered quantity is allowed; it is logged
    /// at WARN and reported in the summary's `over_received` list.
    ///
    /// # Errors
    ///
    /// - `StockError::Validation` for non-positive quantities, malformed
    ///   identifiers, or items that do not match their line
    /// - `StockError::NotFound` when the purchase or a line does not exist
    ///   for the tenant
    /// - `StockError::Conflict` / `StockError::Repository` from the store;
    ///   any error rolls back every write of the call
    #[tracing::instrument(
        skip(self, ctx, request),
        fields(tenant = %ctx.tenant_id, purchase = %request.purchase_id)
    )]
    pub async fn receive(
        &self,
        ctx: &TenantContext,
        request: &ReceiveRequest,
    ) -> Result<ReceiveSummary, StockError> {
        let items = prepare_items(&request.items)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order = db::purchase::find_order(&mut *tx, ctx.tenant_id, request.purchase_id)
            .await?
            .ok_or_else(|| {
                StockError::NotFound(format!(
                    "purchase {} for tenant {}",
                    request.purchase_id, ctx.tenant_id
                ))
            })?;

        let mut summary = ReceiveSummary {
            records: Vec::new(),
            devices_created: 0,
            over_received: Vec::new(),
        };

        for item in &items {
            let line = db::purchase::find_line(&mut *tx, ctx.tenant_id, item.purchase_line_id())
                .await?
                .ok_or_else(|| {
                    StockError::NotFound(format!(
                        "purchase line {} for sku '{}'",
                        item.purchase_line_id(),
                        item.sku()
                    ))
                })?;

            if line.purchase_id != order.id {
                return Err(StockError::Validation(format!(
                    "purchase line {} does not belong to purchase {}",
                    line.id, order.id
                )));
            }
            if !line.active {
                return Err(StockError::Validation(format!(
                    "purchase line {} for sku '{}' is inactive",
                    line.id, line.sku
                )));
            }
            if line.sku != item.sku() {
                return Err(StockError::Validation(format!(
                    "item sku '{}' does not match line {} sku '{}'",
                    item.sku(),
                    line.id,
                    line.sku
                )));
            }

            match item {
                PreparedItem::Bulk { quantity, .. } => {
                    if line.is_serialized {
                        return Err(StockError::Validation(format!(
                            "bulk receipt against serialized line {} (sku '{}')",
                            line.id, line.sku
                        )));
                    }

                    db::stock_ledger::ensure_exists(
                        &mut *tx,
                        ctx.tenant_id,
                        request.warehouse_id,
                        &line.sku,
                        true,
                    )
                    .await?;

                    let record = db::receipt::insert(
                        &mut *tx,
                        &NewReceipt {
                            purchase_id: order.id,
                            purchase_line_id: line.id,
                            sku: line.sku.clone(),
                            device_id: None,
                            quantity: *quantity,
                            tenant_id: ctx.tenant_id,
                            received_by: ctx.actor_id,
                        },
                    )
                    .await?;
                    summary.records.push(record);

                    db::stock_ledger::adjust_quantity(
                        &mut *tx,
                        ctx.tenant_id,
                        request.warehouse_id,
                        &line.sku,
                        i64::from(*quantity),
                    )
                    .await?;
                }
                PreparedItem::Serialized { identifiers, .. } => {
                    if !line.is_serialized {
                        return Err(StockError::Validation(format!(
                            "scanned identifiers against bulk line {} (sku '{}')",
                            line.id, line.sku
                        )));
                    }

                    let ledger_id = db::stock_ledger::ensure_exists(
                        &mut *tx,
                        ctx.tenant_id,
                        request.warehouse_id,
                        &line.sku,
                        false,
                    )
                    .await?;

                    for identifier in identifiers {
                        let resolved = self
                            .resolver
                            .resolve(
                                &mut *tx,
                                ctx,
                                &line.sku,
                                identifier,
                                Some(request.warehouse_id),
                            )
                            .await?;
                        if resolved.created {
                            summary.devices_created += 1;
                        }

                        let record = db::receipt::insert(
                            &mut *tx,
                            &NewReceipt {
                                purchase_id: order.id,
                                purchase_line_id: line.id,
                                sku: line.sku.clone(),
                                device_id: Some(resolved.id),
                                quantity: 1,
                                tenant_id: ctx.tenant_id,
                                received_by: ctx.actor_id,
                            },
                        )
                        .await?;
                        summary.records.push(record);

                        db::stock_ledger::link_device(&mut *tx, ledger_id, resolved.id).await?;
                    }

                    let units = i64::try_from(identifiers.len()).unwrap_or(i64::MAX);
                    db::stock_ledger::adjust_quantity(
                        &mut *tx,
                        ctx.tenant_id,
                        request.warehouse_id,
                        &line.sku,
                        units,
                    )
                    .await?;
                }
            }

            let received = db::receipt::received_for_line(&mut *tx, line.id).await?;
            if received > i64::from(line.quantity_ordered) {
                tracing::warn!(
                    sku = %line.sku,
                    line = %line.id,
                    ordered = line.quantity_ordered,
                    received,
                    "line received beyond ordered quantity"
                );
                summary.over_received.push(OverReceipt {
                    purchase_line_id: line.id,
                    sku: line.sku.clone(),
                    quantity_ordered: line.quantity_ordered,
                    received_quantity: received,
                });
            }
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(
            records = summary.records.len(),
            devices_created = summary.devices_created,
            "delivery recorded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ReceiveItem;

    #[test]
    fn test_prepare_rejects_empty_request() {
        let err = prepare_items(&[]).unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[test]
    fn test_prepare_rejects_non_positive_quantity() {
        let items = [ReceiveItem::Bulk {
            purchase_line_id: PurchaseLineId::new(1),
            sku: "PX-100".to_string(),
            quantity: 0,
        }];
        let err = prepare_items(&items).unwrap_err();
        assert!(err.to_string().contains("PX-100"));
    }

    #[test]
    fn test_prepare_rejects_empty_identifier_list() {
        let items = [ReceiveItem::Serialized {
            purchase_line_id: PurchaseLineId::new(1),
            sku: "PH-9".to_string(),
            identifiers: vec![],
        }];
        assert!(prepare_items(&items).is_err());
    }

    #[test]
    fn test_prepare_classifies_identifiers() {
        let items = [ReceiveItem::Serialized {
            purchase_line_id: PurchaseLineId::new(1),
            sku: "PH-9".to_string(),
            identifiers: vec!["111111111111111".to_string(), "AB12345678".to_string()],
        }];
        let prepared = prepare_items(&items).expect("valid request");
        match prepared.first() {
            Some(PreparedItem::Serialized { identifiers, .. }) => {
                assert!(identifiers[0].is_imei());
                assert!(!identifiers[1].is_imei());
            }
            _ => panic!("expected serialized item"),
        }
    }

    #[test]
    fn test_prepare_carries_identifier_context_in_error() {
        let items = [ReceiveItem::Serialized {
            purchase_line_id: PurchaseLineId::new(1),
            sku: "PH-9".to_string(),
            identifiers: vec!["   ".to_string()],
        }];
        let err = prepare_items(&items).unwrap_err();
        assert!(err.to_string().contains("PH-9"));
    }
}
