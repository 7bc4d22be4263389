//! Order board: the continuously synchronized view over every order in the
//! store, as rendered by the history/status screen.
//!
//! The board subscribes to the orders root and rebuilds its derived state
//! from scratch on every snapshot; nothing is patched incrementally, so
//! removed orders and cleared fields can never leave stale residue behind.
//! Consumers read the current entries or watch for changes.

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{Order, PaymentClassification};
use crate::reconciler;
use crate::store::{paths, OrderStore};

/// One order as the board shows it, with the read-side derivations applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    pub order: Order,
    /// Resolved total: the stored value when valid, else the item sum.
    pub total: f64,
    pub payment: PaymentClassification,
    pub in_debt: bool,
}

pub struct OrderBoard {
    rx: watch::Receiver<Vec<BoardEntry>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl OrderBoard {
    /// Attach to the store and start mirroring the orders root.
    pub fn attach<S: OrderStore>(store: &S) -> Self {
        let mut subscription = store.subscribe(paths::ORDERS);
        let (tx, rx) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                let snapshot = tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    snapshot = subscription.next() => snapshot,
                };
                let Some(snapshot) = snapshot else { break };
                let entries = build_entries(snapshot);
                if tx.send(entries).is_err() {
                    break;
                }
            }
            debug!("order board detached");
        });

        Self { rx, cancel, task }
    }

    /// Current entries, newest order first.
    pub fn entries(&self) -> Vec<BoardEntry> {
        self.rx.borrow().clone()
    }

    /// A watch handle for callers that want change notifications.
    pub fn watch(&self) -> watch::Receiver<Vec<BoardEntry>> {
        self.rx.clone()
    }

    /// Release the subscription; no further snapshots are applied.
    pub fn detach(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl Drop for OrderBoard {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Rebuild the full entry list from one root snapshot. Children that are
/// not valid order documents are skipped, not fatal.
fn build_entries(snapshot: Option<Value>) -> Vec<BoardEntry> {
    let Some(Value::Object(orders)) = snapshot else {
        return Vec::new();
    };

    let mut entries: Vec<BoardEntry> = orders
        .into_iter()
        .filter_map(|(order_id, doc)| {
            let mut order: Order = match serde_json::from_value(doc) {
                Ok(order) => order,
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "skipping malformed order");
                    return None;
                }
            };
            order.order_id = order_id;
            let total = order.resolved_total();
            let payment = reconciler::classify(order.payment_value, total);
            let in_debt = reconciler::in_debt(&order);
            Some(BoardEntry {
                order,
                total,
                payment,
                in_debt,
            })
        })
        .collect();

    // RFC3339 strings sort chronologically; newest first
    entries.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
    entries
}
