//! Order Session Controller: owns the pointer to the order currently being
//! edited, the customer and payment scratch fields, and the manual-entry
//! draft. At most one order is active per session; switching or creating
//! replaces the ledger wholesale.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map};
use tracing::{info, warn};

use crate::codec;
use crate::error::EngineError;
use crate::ledger::ItemLedger;
use crate::model::Order;
use crate::store::{paths, OrderStore};

/// Persisted phone numbers carry at most DDD + 9 digits.
const MAX_PHONE_DIGITS: usize = 11;
/// Fewer digits than this makes the customer record incomplete.
const MIN_PHONE_DIGITS: usize = 10;

/// Result of a successful finalize. `order_id` is the handoff to whatever
/// navigates to the order afterwards; `warning` is the non-blocking customer
/// completeness notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub order_id: String,
    pub warning: Option<String>,
}

/// Scratch fields for a manually typed item, kept as raw operator text until
/// the draft is committed to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ManualDraft {
    name: String,
    quantity: String,
    unit_price: String,
}

pub struct OrderSession<S: OrderStore> {
    store: Arc<S>,
    ledger: Option<ItemLedger<S>>,
    customer_name: String,
    customer_address: String,
    customer_phone: String,
    payment_method: String,
    payment_value: f64,
    observation: String,
    draft: ManualDraft,
}

impl<S: OrderStore> OrderSession<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            ledger: None,
            customer_name: String::new(),
            customer_address: String::new(),
            customer_phone: String::new(),
            payment_method: "Cash".to_string(),
            payment_value: 0.0,
            observation: String::new(),
            draft: ManualDraft::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Active order
    // -----------------------------------------------------------------------

    pub fn active_order_id(&self) -> Option<&str> {
        self.ledger.as_ref().map(ItemLedger::order_id)
    }

    /// The active order's ledger, or [`EngineError::NoActiveOrder`].
    pub fn ledger(&self) -> Result<&ItemLedger<S>, EngineError> {
        self.ledger.as_ref().ok_or(EngineError::NoActiveOrder)
    }

    pub fn ledger_mut(&mut self) -> Result<&mut ItemLedger<S>, EngineError> {
        self.ledger.as_mut().ok_or(EngineError::NoActiveOrder)
    }

    /// Create the active order if there is none yet and return its id.
    pub async fn ensure_active_order(&mut self) -> Result<String, EngineError> {
        if let Some(ledger) = &self.ledger {
            return Ok(ledger.order_id().to_string());
        }
        self.create_order().await
    }

    /// Allocate a fresh order, seed its document in the store, and make it
    /// the active order. The retained customer fields are written into the
    /// seed; payment and draft state start from defaults. On write failure
    /// the active pointer is rolled back so the session does not point at an
    /// order that was never persisted.
    pub async fn create_order(&mut self) -> Result<String, EngineError> {
        let order_id = match self.store.generate_key(paths::ORDERS).await {
            Ok(order_id) => order_id,
            Err(err) => {
                warn!(error = %err, "order id allocation failed, rolling back");
                self.ledger = None;
                return Err(err.into());
            }
        };
        self.reset_for_new_order();

        let seed = Order {
            order_id: order_id.clone(),
            customer_name: self.customer_name.clone(),
            customer_address: self.customer_address.clone(),
            customer_phone: self.customer_phone.clone(),
            payment_method: self.payment_method.clone(),
            created_at: Utc::now().to_rfc3339(),
            ..Order::default()
        };
        let doc = serde_json::to_value(&seed)
            .map_err(|e| EngineError::validation(format!("serialize order: {e}")))?;

        self.ledger = Some(ItemLedger::new(self.store.clone(), order_id.clone()));

        if let Err(err) = self.store.write_whole(&paths::order(&order_id), doc).await {
            warn!(order_id = %order_id, error = %err, "order creation write failed, rolling back");
            self.ledger = None;
            return Err(err.into());
        }

        info!(order_id = %order_id, "order created");
        Ok(order_id)
    }

    /// Load an existing order and make it the active one. An absent order
    /// clears the active pointer and reports [`EngineError::NotFound`].
    pub async fn switch_to(&mut self, order_id: &str) -> Result<(), EngineError> {
        let Some(doc) = self.store.read_once(&paths::order(order_id)).await? else {
            self.ledger = None;
            self.reset_for_new_order();
            return Err(EngineError::not_found(format!("order {order_id}")));
        };

        let mut order: Order = serde_json::from_value(doc)
            .map_err(|e| EngineError::validation(format!("malformed order document: {e}")))?;
        order.order_id = order_id.to_string();

        self.customer_name = order.customer_name;
        self.customer_address = order.customer_address;
        self.customer_phone = order.customer_phone;
        self.payment_method = order.payment_method;
        self.payment_value = order.payment_value;
        self.observation = order.observation;
        self.draft = ManualDraft::default();
        self.ledger = Some(ItemLedger::hydrate(
            self.store.clone(),
            order_id,
            order.items,
        ));

        info!(order_id, "switched to existing order");
        Ok(())
    }

    /// Customer fields survive into the next order (the same customer often
    /// places several); payment and the manual draft do not.
    fn reset_for_new_order(&mut self) {
        self.payment_method = "Cash".to_string();
        self.payment_value = 0.0;
        self.observation = String::new();
        self.draft = ManualDraft::default();
    }

    // -----------------------------------------------------------------------
    // Customer fields
    // -----------------------------------------------------------------------

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn customer_address(&self) -> &str {
        &self.customer_address
    }

    /// Digits-only canonical phone.
    pub fn customer_phone(&self) -> &str {
        &self.customer_phone
    }

    /// Display form of the phone, formatted at the edge only.
    pub fn customer_phone_display(&self) -> String {
        codec::format_phone(&self.customer_phone)
    }

    pub fn set_customer_name(&mut self, raw: &str) {
        self.customer_name = codec::title_case(raw.trim());
    }

    pub fn set_customer_address(&mut self, raw: &str) {
        self.customer_address = codec::title_case(raw.trim());
    }

    pub fn set_customer_phone(&mut self, raw: &str) {
        let mut digits = codec::digits_only(raw);
        digits.truncate(MAX_PHONE_DIGITS);
        self.customer_phone = digits;
    }

    /// Non-blocking completeness check: finalize proceeds regardless, the
    /// caller decides whether to prompt first.
    pub fn customer_warning(&self) -> Option<String> {
        let mut missing = Vec::new();
        if self.customer_name.is_empty() {
            missing.push("name");
        }
        if self.customer_address.is_empty() {
            missing.push("address");
        }
        if self.customer_phone.len() < MIN_PHONE_DIGITS {
            missing.push("phone");
        }
        if missing.is_empty() {
            None
        } else {
            Some(format!("customer record incomplete: {}", missing.join(", ")))
        }
    }

    // -----------------------------------------------------------------------
    // Payment fields
    // -----------------------------------------------------------------------

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn payment_value(&self) -> f64 {
        self.payment_value
    }

    pub fn set_payment_method(&mut self, method: impl Into<String>) {
        self.payment_method = method.into();
    }

    /// Parse an operator-typed payment amount. Negative input is clamped to
    /// zero rather than stored.
    pub fn set_payment_value_text(&mut self, raw: &str) {
        let value = codec::parse_currency(raw);
        if value < 0.0 {
            warn!(raw, "negative payment value clamped to zero");
            self.payment_value = 0.0;
        } else {
            self.payment_value = value;
        }
    }

    pub fn observation(&self) -> &str {
        &self.observation
    }

    pub fn set_observation(&mut self, text: impl Into<String>) {
        self.observation = text.into();
    }

    // -----------------------------------------------------------------------
    // Manual item draft
    // -----------------------------------------------------------------------

    pub fn set_draft_name(&mut self, raw: &str) {
        self.draft.name = raw.to_string();
    }

    pub fn set_draft_quantity(&mut self, raw: &str) {
        self.draft.quantity = codec::digits_only(raw);
    }

    pub fn set_draft_unit_price(&mut self, raw: &str) {
        self.draft.unit_price = raw.to_string();
    }

    /// Commit the manual draft to the active order's ledger. The draft is
    /// cleared only when the item was accepted.
    pub async fn add_draft_item(&mut self) -> Result<String, EngineError> {
        let quantity = self.draft.quantity.parse::<u32>().unwrap_or(0);
        let unit_price = codec::parse_currency(&self.draft.unit_price);
        let name = self.draft.name.clone();

        let ledger = self.ledger.as_mut().ok_or(EngineError::NoActiveOrder)?;
        let item_id = ledger.add_manual_item(&name, quantity, unit_price).await?;
        self.draft = ManualDraft::default();
        Ok(item_id)
    }

    // -----------------------------------------------------------------------
    // Finalize
    // -----------------------------------------------------------------------

    /// Commit the session's customer and payment state onto the active
    /// order in a single partial write, stamping `totalOrderValue` from the
    /// ledger and `lastUpdatedAt` with the commit time.
    ///
    /// An order with no items cannot be finalized. Customer incompleteness
    /// is reported as a warning on the outcome, never as an error.
    pub async fn finalize_order(&mut self) -> Result<FinalizeOutcome, EngineError> {
        let ledger = self.ledger.as_ref().ok_or(EngineError::NoActiveOrder)?;
        if ledger.is_empty() {
            return Err(EngineError::EmptyOrder);
        }
        let order_id = ledger.order_id().to_string();
        let total = ledger.order_total();

        let mut fields = Map::new();
        fields.insert("customerName".into(), json!(self.customer_name));
        fields.insert("customerAddress".into(), json!(self.customer_address));
        fields.insert("customerPhone".into(), json!(self.customer_phone));
        fields.insert("paymentMethod".into(), json!(self.payment_method));
        fields.insert("paymentValue".into(), json!(self.payment_value));
        fields.insert("totalOrderValue".into(), json!(total));
        fields.insert("observation".into(), json!(self.observation));
        fields.insert("lastUpdatedAt".into(), json!(Utc::now().to_rfc3339()));
        self.store
            .write_partial(&paths::order(&order_id), fields)
            .await?;

        let warning = self.customer_warning();
        info!(
            order_id = %order_id,
            total = total,
            warned = warning.is_some(),
            "order finalized"
        );
        Ok(FinalizeOutcome { order_id, warning })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderStatus, Product};
    use crate::store::MemoryStore;

    fn session(store: &Arc<MemoryStore>) -> OrderSession<MemoryStore> {
        OrderSession::new(store.clone())
    }

    fn xerox() -> Product {
        Product::new("3", "Xerox", "Impressão", 1.0)
    }

    #[tokio::test]
    async fn create_seeds_an_open_order_document() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);

        let order_id = session.create_order().await.unwrap();
        assert_eq!(session.active_order_id(), Some(order_id.as_str()));

        let doc = store
            .read_once(&paths::order(&order_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["status"], "open");
        assert_eq!(doc["paymentMethod"], "Cash");
        assert!(doc["createdAt"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn create_rolls_back_pointer_on_write_failure() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        store.fail_writes(true);

        assert!(matches!(
            session.create_order().await,
            Err(EngineError::Store(_))
        ));
        assert_eq!(session.active_order_id(), None);
        assert!(matches!(session.ledger(), Err(EngineError::NoActiveOrder)));
    }

    #[tokio::test]
    async fn key_allocation_failure_also_rolls_back_the_pointer() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        session.create_order().await.unwrap();
        store.fail_keys(true);

        assert!(matches!(
            session.create_order().await,
            Err(EngineError::Store(_))
        ));
        assert_eq!(session.active_order_id(), None);
    }

    #[tokio::test]
    async fn ensure_active_order_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        let first = session.ensure_active_order().await.unwrap();
        let second = session.ensure_active_order().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn switch_to_missing_order_clears_state() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        session.create_order().await.unwrap();

        assert!(matches!(
            session.switch_to("ghost").await,
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(session.active_order_id(), None);
    }

    #[tokio::test]
    async fn switch_to_hydrates_ledger_and_fields() {
        let store = Arc::new(MemoryStore::new());
        let mut first = session(&store);
        let order_id = first.create_order().await.unwrap();
        first
            .ledger_mut()
            .unwrap()
            .add_catalog_item(&xerox())
            .await
            .unwrap();
        first.set_customer_name("maria souza");
        first.set_customer_phone("(11) 98765-4321");
        first.set_payment_value_text("1,00");
        first.finalize_order().await.unwrap();

        let mut second = session(&store);
        second.switch_to(&order_id).await.unwrap();
        assert_eq!(second.customer_name(), "Maria Souza");
        assert_eq!(second.customer_phone(), "11987654321");
        assert_eq!(second.payment_value(), 1.0);
        assert_eq!(second.ledger().unwrap().len(), 1);
        assert_eq!(second.ledger().unwrap().order_total(), 1.0);
    }

    #[tokio::test]
    async fn new_order_keeps_customer_and_clears_payment_and_draft() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        session.set_customer_name("joão");
        session.set_customer_address("rua b, 2");
        session.set_payment_method("Pix");
        session.set_payment_value_text("50,00");
        session.set_draft_name("Plastificação");
        session.set_draft_quantity("2");
        session.set_draft_unit_price("3,00");

        let order_id = session.create_order().await.unwrap();

        assert_eq!(session.customer_name(), "João");
        assert_eq!(session.customer_address(), "Rua B, 2");
        assert_eq!(session.payment_method(), "Cash");
        // retained customer fields are written into the seed document
        let doc = store
            .read_once(&paths::order(&order_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["customerName"], "João");
        assert_eq!(doc["paymentMethod"], "Cash");
        assert_eq!(doc["paymentValue"], 0.0);
        assert_eq!(session.payment_value(), 0.0);
        // draft was cleared: committing it now fails validation
        assert!(matches!(
            session.add_draft_item().await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn draft_item_goes_through_codec_and_clears_on_success() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        session.create_order().await.unwrap();
        session.set_draft_name("encadernação espiral");
        session.set_draft_quantity("2x"); // stray characters stripped
        session.set_draft_unit_price("7,50");

        let item_id = session.add_draft_item().await.unwrap();
        let ledger = session.ledger().unwrap();
        let item = ledger.item(&item_id).unwrap();
        assert_eq!(item.name, "Encadernação Espiral");
        assert_eq!(item.quantity, 2);
        assert_eq!(item.total, 15.0);

        // draft is empty again
        assert!(matches!(
            session.add_draft_item().await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn finalize_requires_an_active_non_empty_order() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        assert!(matches!(
            session.finalize_order().await,
            Err(EngineError::NoActiveOrder)
        ));

        session.create_order().await.unwrap();
        assert!(matches!(
            session.finalize_order().await,
            Err(EngineError::EmptyOrder)
        ));
    }

    #[tokio::test]
    async fn finalize_writes_totals_and_reports_soft_warning() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        let order_id = session.create_order().await.unwrap();
        session
            .ledger_mut()
            .unwrap()
            .add_catalog_item(&xerox())
            .await
            .unwrap();
        session.set_payment_method("Pix");
        session.set_payment_value_text("10,00");

        // no customer data at all: finalize succeeds with a warning
        let outcome = session.finalize_order().await.unwrap();
        assert_eq!(outcome.order_id, order_id);
        let warning = outcome.warning.unwrap();
        assert!(warning.contains("name"));
        assert!(warning.contains("phone"));

        let doc = store
            .read_once(&paths::order(&order_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["totalOrderValue"], 1.0);
        assert_eq!(doc["paymentMethod"], "Pix");
        assert_eq!(doc["paymentValue"], 10.0);
        assert!(doc.get("lastUpdatedAt").is_some());
        // finalize does not close the order
        let order: Order = serde_json::from_value(doc).unwrap();
        assert_eq!(order.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn complete_customer_produces_no_warning() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(&store);
        session.create_order().await.unwrap();
        session
            .ledger_mut()
            .unwrap()
            .add_catalog_item(&xerox())
            .await
            .unwrap();
        session.set_customer_name("ana");
        session.set_customer_address("rua c, 3");
        session.set_customer_phone("1187654321");

        let outcome = session.finalize_order().await.unwrap();
        assert_eq!(outcome.warning, None);
    }
}
