//! Core data model: catalog products, order line items, and the order
//! aggregate, serialized with the exact camelCase field names used by the
//! shared store (`orders/{orderId}/...`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Tolerance for monetary threshold comparisons. Amounts travel as f64 JSON
/// numbers; this only absorbs float noise, not rounding policy.
pub const EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Catalog product
// ---------------------------------------------------------------------------

/// A catalog entry. Immutable once listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Unit price, non-negative.
    pub price: f64,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            price,
        }
    }
}

// ---------------------------------------------------------------------------
// Order line item
// ---------------------------------------------------------------------------

/// One line of an order. `total` is always recomputed from
/// `quantity * unit_price`; values arriving from the store are never trusted
/// to satisfy that on their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderItem {
    /// Catalog product id, or a `manual-` prefixed generated id.
    pub id: String,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

impl OrderItem {
    pub fn recompute_total(&mut self) {
        self.total = f64::from(self.quantity) * self.unit_price;
    }
}

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

/// Order lifecycle status. `closed_at` is present iff the status is not
/// [`OrderStatus::Open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Open,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Delivered and canceled orders are closed.
    pub fn is_closed(&self) -> bool {
        !matches!(self, OrderStatus::Open)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payment classification
// ---------------------------------------------------------------------------

/// Display classification of an order's payment state. Derived on read,
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentClassification {
    Unpaid,
    Partial,
    Paid,
    /// The order total is (still) zero.
    NoValue,
}

impl fmt::Display for PaymentClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentClassification::Unpaid => "unpaid",
            PaymentClassification::Partial => "partial",
            PaymentClassification::Paid => "paid",
            PaymentClassification::NoValue => "no value",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Order aggregate
// ---------------------------------------------------------------------------

/// The order aggregate as persisted at `orders/{orderId}`.
///
/// `order_id` is the document key, not a field of the node, so it is skipped
/// during (de)serialization and filled in by whoever read the document.
/// Deserialization is lenient: absent fields take defaults and malformed
/// item children are dropped rather than failing the whole order, since
/// other terminals (or older revisions) may have written partial documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    #[serde(skip)]
    pub order_id: String,
    pub customer_name: String,
    pub customer_address: String,
    /// Digits-only canonical form; formatting is presentation-only.
    pub customer_phone: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub payment_value: f64,
    /// Stored order total. Absent until first finalized; negative or absent
    /// values fall back to the item sum (see [`Order::resolved_total`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_order_value: Option<f64>,
    pub status: OrderStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_completed_date: Option<String>,
    pub observation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<String>,
    #[serde(deserialize_with = "lenient_items")]
    pub items: BTreeMap<String, OrderItem>,
}

fn default_payment_method() -> String {
    "Cash".to_string()
}

impl Order {
    /// Sum of the line-item totals, recomputed on every call.
    pub fn items_total(&self) -> f64 {
        self.items.values().map(|item| item.total).sum()
    }

    /// The order total to use for payment math: the stored
    /// `totalOrderValue` when present and non-negative, otherwise the item
    /// sum.
    pub fn resolved_total(&self) -> f64 {
        match self.total_order_value {
            Some(total) if total >= 0.0 => total,
            _ => self.items_total(),
        }
    }
}

/// Deserialize the `items` map, dropping children that are not valid item
/// objects and backfilling each item's `id` from its map key.
fn lenient_items<'de, D>(deserializer: D) -> Result<BTreeMap<String, OrderItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let mut items = BTreeMap::new();
    if let Value::Object(map) = raw {
        for (key, node) in map {
            match serde_json::from_value::<OrderItem>(node) {
                Ok(mut item) => {
                    if item.id.is_empty() {
                        item.id = key.clone();
                    }
                    items.insert(key, item);
                }
                Err(_) => continue,
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_total_recomputes_from_quantity_and_price() {
        let mut item = OrderItem {
            id: "1".into(),
            name: "Xerox".into(),
            category: "Impressão".into(),
            quantity: 3,
            unit_price: 1.0,
            total: 0.0,
        };
        item.recompute_total();
        assert_eq!(item.total, 3.0);
    }

    #[test]
    fn order_round_trips_through_store_schema() {
        let doc = json!({
            "customerName": "Maria",
            "customerAddress": "Rua A, 10",
            "customerPhone": "11987654321",
            "paymentMethod": "Pix",
            "paymentValue": 20.0,
            "totalOrderValue": 30.0,
            "status": "delivered",
            "createdAt": "2025-01-02T10:00:00+00:00",
            "closedAt": "2025-01-02T11:00:00+00:00",
            "observation": "sem cebola",
            "items": {
                "3": { "id": "3", "name": "Xerox", "category": "Impressão",
                       "quantity": 2, "unitPrice": 1.0, "total": 2.0 }
            }
        });
        let order: Order = serde_json::from_value(doc).expect("order parses");
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.payment_method, "Pix");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items["3"].quantity, 2);

        let back = serde_json::to_value(&order).expect("order serializes");
        assert_eq!(back["customerName"], "Maria");
        assert_eq!(back["status"], "delivered");
        assert_eq!(back["items"]["3"]["unitPrice"], 1.0);
        assert!(back.get("orderId").is_none());
        assert!(back.get("paymentCompletedDate").is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let order: Order = serde_json::from_value(json!({})).expect("empty doc parses");
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.payment_method, "Cash");
        assert_eq!(order.payment_value, 0.0);
        assert!(order.items.is_empty());
        assert_eq!(order.total_order_value, None);
    }

    #[test]
    fn malformed_items_are_dropped_not_fatal() {
        let order: Order = serde_json::from_value(json!({
            "items": {
                "good": { "name": "Curriculo", "quantity": 1, "unitPrice": 15.0, "total": 15.0 },
                "bad": "not an item"
            }
        }))
        .expect("order still parses");
        assert_eq!(order.items.len(), 1);
        // id backfilled from the map key
        assert_eq!(order.items["good"].id, "good");
    }

    #[test]
    fn resolved_total_prefers_valid_stored_value() {
        let mut order = Order::default();
        order.items.insert(
            "1".into(),
            OrderItem {
                id: "1".into(),
                total: 10.0,
                ..Default::default()
            },
        );
        assert_eq!(order.resolved_total(), 10.0);
        order.total_order_value = Some(12.5);
        assert_eq!(order.resolved_total(), 12.5);
        order.total_order_value = Some(-1.0);
        assert_eq!(order.resolved_total(), 10.0);
    }
}
