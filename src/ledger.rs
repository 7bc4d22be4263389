//! Order Item Ledger: the in-memory line items of the order being edited.
//!
//! Every mutation applies to local state first (the local view is the source
//! of truth for the current session), then writes the changed item sub-path
//! to the shared store. A failed write is reported to the caller but the
//! optimistic local mutation is deliberately NOT rolled back; the next
//! successful write or a full reload reconciles the views.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map};
use tracing::{info, warn};
use uuid::Uuid;

use crate::codec;
use crate::error::EngineError;
use crate::model::{OrderItem, Product};
use crate::store::{paths, OrderStore};

/// Id prefix for manually entered items, so they can never collide with
/// catalog product ids.
const MANUAL_ID_PREFIX: &str = "manual-";

pub struct ItemLedger<S: OrderStore> {
    store: Arc<S>,
    order_id: String,
    items: BTreeMap<String, OrderItem>,
}

impl<S: OrderStore> ItemLedger<S> {
    /// Fresh ledger for a newly created order.
    pub(crate) fn new(store: Arc<S>, order_id: impl Into<String>) -> Self {
        Self {
            store,
            order_id: order_id.into(),
            items: BTreeMap::new(),
        }
    }

    /// Ledger hydrated from a loaded order document.
    pub(crate) fn hydrate(
        store: Arc<S>,
        order_id: impl Into<String>,
        items: BTreeMap<String, OrderItem>,
    ) -> Self {
        Self {
            store,
            order_id: order_id.into(),
            items,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.values()
    }

    pub fn item(&self, item_id: &str) -> Option<&OrderItem> {
        self.items.get(item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Order total: sum of item totals, recomputed on every call.
    pub fn order_total(&self) -> f64 {
        self.items.values().map(|item| item.total).sum()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add one unit of a catalog product. If the item is already on the
    /// order its quantity is incremented instead of appending a duplicate
    /// line.
    pub async fn add_catalog_item(&mut self, product: &Product) -> Result<(), EngineError> {
        let item = self
            .items
            .entry(product.id.clone())
            .or_insert_with(|| OrderItem {
                id: product.id.clone(),
                name: product.name.clone(),
                category: product.category.clone(),
                quantity: 0,
                unit_price: product.price,
                total: 0.0,
            });
        item.quantity += 1;
        item.recompute_total();
        let snapshot = item.clone();

        info!(
            order_id = %self.order_id,
            item_id = %snapshot.id,
            quantity = snapshot.quantity,
            "catalog item added"
        );
        self.write_item(&snapshot).await
    }

    /// Append a manually entered item. The name is title-cased and must be
    /// non-empty; quantity and unit price must be strictly positive.
    /// Returns the generated item id.
    pub async fn add_manual_item(
        &mut self,
        name: &str,
        quantity: u32,
        unit_price: f64,
    ) -> Result<String, EngineError> {
        let name = codec::title_case(name.trim());
        if name.is_empty() {
            return Err(EngineError::validation("item name is required"));
        }
        if quantity == 0 {
            return Err(EngineError::validation("quantity must be positive"));
        }
        if unit_price <= 0.0 {
            return Err(EngineError::validation("unit price must be positive"));
        }

        let item_id = format!("{MANUAL_ID_PREFIX}{}", Uuid::new_v4());
        let mut item = OrderItem {
            id: item_id.clone(),
            name,
            category: "Manual".to_string(),
            quantity,
            unit_price,
            total: 0.0,
        };
        item.recompute_total();
        self.items.insert(item_id.clone(), item.clone());

        info!(order_id = %self.order_id, item_id = %item_id, "manual item added");
        self.write_item(&item).await?;
        Ok(item_id)
    }

    /// Set an item's quantity. Negative input clamps to 0; an unknown item
    /// id is logged and ignored.
    pub async fn set_quantity(&mut self, item_id: &str, quantity: i64) -> Result<(), EngineError> {
        let quantity = quantity.max(0) as u32;
        let Some(item) = self.items.get_mut(item_id) else {
            warn!(order_id = %self.order_id, item_id, "set_quantity on unknown item");
            return Ok(());
        };
        item.quantity = quantity;
        item.recompute_total();
        let (quantity, total) = (item.quantity, item.total);

        let mut fields = Map::new();
        fields.insert("quantity".into(), json!(quantity));
        fields.insert("total".into(), json!(total));
        self.patch_item(item_id, fields).await
    }

    /// Set an item's unit price from operator-typed text (pt-BR decimal
    /// comma). A negative parsed value is rejected as a no-op.
    pub async fn set_unit_price(&mut self, item_id: &str, raw: &str) -> Result<(), EngineError> {
        let unit_price = codec::parse_currency(raw);
        if unit_price < 0.0 {
            warn!(order_id = %self.order_id, item_id, raw, "negative unit price rejected");
            return Ok(());
        }
        let Some(item) = self.items.get_mut(item_id) else {
            warn!(order_id = %self.order_id, item_id, "set_unit_price on unknown item");
            return Ok(());
        };
        item.unit_price = unit_price;
        item.recompute_total();
        let total = item.total;

        let mut fields = Map::new();
        fields.insert("unitPrice".into(), json!(unit_price));
        fields.insert("total".into(), json!(total));
        self.patch_item(item_id, fields).await
    }

    /// Rename an item. The name is title-cased; an empty result is rejected.
    pub async fn set_name(&mut self, item_id: &str, raw: &str) -> Result<(), EngineError> {
        let name = codec::title_case(raw.trim());
        if name.is_empty() {
            return Err(EngineError::validation("item name cannot be empty"));
        }
        let Some(item) = self.items.get_mut(item_id) else {
            warn!(order_id = %self.order_id, item_id, "set_name on unknown item");
            return Ok(());
        };
        item.name = name.clone();

        let mut fields = Map::new();
        fields.insert("name".into(), json!(name));
        self.patch_item(item_id, fields).await
    }

    /// Remove one item. The caller is responsible for having confirmed
    /// intent; an unknown id is a no-op.
    pub async fn remove_item(&mut self, item_id: &str) -> Result<(), EngineError> {
        if self.items.remove(item_id).is_none() {
            warn!(order_id = %self.order_id, item_id, "remove_item on unknown item");
            return Ok(());
        }
        info!(order_id = %self.order_id, item_id, "item removed");
        self.store
            .delete(&paths::item(&self.order_id, item_id))
            .await?;
        Ok(())
    }

    /// Remove every item (the whole `items` subtree). Customer and payment
    /// fields on the order are untouched.
    pub async fn clear_all(&mut self) -> Result<(), EngineError> {
        self.items.clear();
        info!(order_id = %self.order_id, "all items cleared");
        self.store.delete(&paths::items(&self.order_id)).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Store writes
    // -----------------------------------------------------------------------

    async fn write_item(&self, item: &OrderItem) -> Result<(), EngineError> {
        let value = serde_json::to_value(item)
            .map_err(|e| EngineError::validation(format!("serialize item: {e}")))?;
        self.store
            .write_whole(&paths::item(&self.order_id, &item.id), value)
            .await?;
        Ok(())
    }

    async fn patch_item(
        &self,
        item_id: &str,
        fields: Map<String, serde_json::Value>,
    ) -> Result<(), EngineError> {
        self.store
            .write_partial(&paths::item(&self.order_id, item_id), fields)
            .await?;
        Ok(())
    }
}
