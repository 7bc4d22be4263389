//! Payment & Status Reconciler: lifecycle transitions and payment math for
//! orders already in the store, plus the pure classification helpers the
//! board view renders from.
//!
//! Status writes are read-check-then-write: the current document is read,
//! the transition validated against it, and the change applied as a partial
//! write. The store stays last-write-wins; there is no optimistic locking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::clock;
use crate::error::EngineError;
use crate::model::{Order, OrderStatus, PaymentClassification, EPSILON};
use crate::store::{paths, OrderStore};

// ---------------------------------------------------------------------------
// Pure classification
// ---------------------------------------------------------------------------

/// Classify a payment against a total. A total of (effectively) zero means
/// the order has no value yet and cannot be classified as paid or unpaid.
pub fn classify(paid: f64, total: f64) -> PaymentClassification {
    if total <= EPSILON {
        return PaymentClassification::NoValue;
    }
    if paid >= total - EPSILON {
        return PaymentClassification::Paid;
    }
    if paid > EPSILON {
        return PaymentClassification::Partial;
    }
    PaymentClassification::Unpaid
}

/// Change due (positive) or amount still owed (negative).
pub fn balance(paid: f64, total: f64) -> f64 {
    paid - total
}

/// The in-debt condition: the order went out (`delivered`) but the money
/// never fully came in. Drives the highest-severity badge, overriding the
/// plain classification.
pub fn in_debt(order: &Order) -> bool {
    order.status == OrderStatus::Delivered
        && matches!(
            classify(order.payment_value, order.resolved_total()),
            PaymentClassification::Unpaid | PaymentClassification::Partial
        )
}

/// Minutes an order has been closed while still owing money. Derived on
/// every read so it keeps growing until the debt is settled. `None` when
/// the order is not in debt or was never closed.
pub fn debt_minutes(order: &Order, now: DateTime<Utc>) -> Option<i64> {
    if !in_debt(order) {
        return None;
    }
    let closed_at = order.closed_at.as_deref()?;
    clock::minutes_since(closed_at, now)
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler<S: OrderStore> {
    store: Arc<S>,
}

impl<S: OrderStore> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn load(&self, order_id: &str) -> Result<Order, EngineError> {
        let Some(doc) = self.store.read_once(&paths::order(order_id)).await? else {
            return Err(EngineError::not_found(format!("order {order_id}")));
        };
        let mut order: Order = serde_json::from_value(doc)
            .map_err(|e| EngineError::validation(format!("malformed order document: {e}")))?;
        order.order_id = order_id.to_string();
        Ok(order)
    }

    // -----------------------------------------------------------------------
    // Status transitions
    // -----------------------------------------------------------------------

    /// Close an open order as delivered, stamping `closedAt`.
    pub async fn mark_delivered(&self, order_id: &str) -> Result<(), EngineError> {
        self.close(order_id, OrderStatus::Delivered).await
    }

    /// Close an open order as canceled, stamping `closedAt`.
    pub async fn mark_canceled(&self, order_id: &str) -> Result<(), EngineError> {
        self.close(order_id, OrderStatus::Canceled).await
    }

    async fn close(&self, order_id: &str, target: OrderStatus) -> Result<(), EngineError> {
        let order = self.load(order_id).await?;
        if order.status != OrderStatus::Open {
            return Err(EngineError::validation(format!(
                "cannot mark a {} order as {target}",
                order.status
            )));
        }

        let mut fields = Map::new();
        fields.insert("status".into(), json!(target));
        fields.insert("closedAt".into(), json!(Utc::now().to_rfc3339()));
        self.store
            .write_partial(&paths::order(order_id), fields)
            .await?;
        info!(order_id, status = %target, "order closed");
        Ok(())
    }

    /// Reopen a closed order, clearing `closedAt`.
    pub async fn reopen(&self, order_id: &str) -> Result<(), EngineError> {
        let order = self.load(order_id).await?;
        if !order.status.is_closed() {
            return Err(EngineError::validation(
                "cannot reopen an order that is already open",
            ));
        }

        let mut fields = Map::new();
        fields.insert("status".into(), json!(OrderStatus::Open));
        fields.insert("closedAt".into(), Value::Null);
        self.store
            .write_partial(&paths::order(order_id), fields)
            .await?;
        info!(order_id, "order reopened");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Payments
    // -----------------------------------------------------------------------

    /// Record a payment amount against an order. `paymentCompletedDate` is
    /// stamped when the amount covers the order's resolved total (and the
    /// order has value), and cleared otherwise.
    pub async fn record_payment(&self, order_id: &str, amount: f64) -> Result<(), EngineError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(EngineError::validation("payment amount must be non-negative"));
        }
        let order = self.load(order_id).await?;
        let total = order.resolved_total();
        let covers = total > EPSILON && amount >= total - EPSILON;

        let mut fields = Map::new();
        fields.insert("paymentValue".into(), json!(amount));
        fields.insert(
            "paymentCompletedDate".into(),
            if covers {
                json!(Utc::now().to_rfc3339())
            } else {
                Value::Null
            },
        );
        self.store
            .write_partial(&paths::order(order_id), fields)
            .await?;
        info!(order_id, amount, settled = covers, "payment recorded");
        Ok(())
    }

    /// Settle the order outright: record its full resolved total as paid.
    pub async fn mark_paid(&self, order_id: &str) -> Result<(), EngineError> {
        let order = self.load(order_id).await?;
        self.record_payment(order_id, order.resolved_total()).await
    }

    /// Clear the payment back to zero and drop `paymentCompletedDate`.
    pub async fn reset_payment(&self, order_id: &str) -> Result<(), EngineError> {
        // existence check keeps this from resurrecting a deleted order
        self.load(order_id).await?;
        let mut fields = Map::new();
        fields.insert("paymentValue".into(), json!(0.0));
        fields.insert("paymentCompletedDate".into(), Value::Null);
        self.store
            .write_partial(&paths::order(order_id), fields)
            .await?;
        info!(order_id, "payment reset");
        Ok(())
    }

    /// Remove the order document and everything under it.
    pub async fn delete_order(&self, order_id: &str) -> Result<(), EngineError> {
        self.store.delete(&paths::order(order_id)).await?;
        info!(order_id, "order deleted");
        Ok(())
    }
}
