//! Shared order store interface.
//!
//! The engine consumes a hierarchical key/value document tree addressed by
//! `/`-separated paths; the storage engine itself is an external
//! collaborator (a Firebase-style realtime database in production). The
//! store's conflict policy is last-write-wins: the most recent write to a
//! field replaces any prior value with no merge.
//!
//! [`MemoryStore`] is a faithful in-process implementation used as the test
//! and reference backend.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Path helpers for the persisted order layout:
/// `orders/{orderId}/{...fields..., items/{itemId}/{...}}`.
pub mod paths {
    /// Root collection holding one document per order.
    pub const ORDERS: &str = "orders";

    pub fn order(order_id: &str) -> String {
        format!("{ORDERS}/{order_id}")
    }

    pub fn items(order_id: &str) -> String {
        format!("{ORDERS}/{order_id}/items")
    }

    pub fn item(order_id: &str, item_id: &str) -> String {
        format!("{ORDERS}/{order_id}/items/{item_id}")
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A continuous subscription to one path.
///
/// The store delivers the current full snapshot immediately on subscribe and
/// again after every change — whole node values, never diffs. `None` means
/// the node is absent. Dropping the subscription (or calling
/// [`Subscription::unsubscribe`]) releases it; no further snapshots arrive.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Option<Value>>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Next snapshot, or `None` once the subscription is released.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            snapshot = self.rx.recv() => snapshot,
        }
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Remote document store operations the engine depends on.
///
/// Futures are `Send` so engine state can be driven from spawned tasks.
pub trait OrderStore: Send + Sync + 'static {
    /// Allocate a globally unique child key under `parent` without writing
    /// any data.
    fn generate_key(&self, parent: &str)
        -> impl Future<Output = Result<String, StoreError>> + Send;

    /// One-shot read of the node at `path`; `Ok(None)` when absent.
    fn read_once(&self, path: &str)
        -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Subscribe to full-snapshot change notifications for `path`.
    fn subscribe(&self, path: &str) -> Subscription;

    /// Replace the node at `path` entirely.
    fn write_whole(
        &self,
        path: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Merge named fields into the node at `path` without touching
    /// siblings. A `Null` field value removes that field.
    fn write_partial(
        &self,
        path: &str,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the node at `path` and its entire subtree.
    fn delete(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

struct Subscriber {
    path: String,
    tx: mpsc::UnboundedSender<Option<Value>>,
    cancel: CancellationToken,
}

struct MemoryInner {
    root: Value,
    subscribers: Vec<Subscriber>,
}

/// In-memory [`OrderStore`] over a JSON tree. Single-process only; used as
/// the test backend and as the reference semantics for real adapters
/// (notably the `Null`-removes-field rule of partial writes).
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail_writes: AtomicBool,
    fail_keys: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                root: Value::Object(Map::new()),
                subscribers: Vec::new(),
            }),
            fail_writes: AtomicBool::new(false),
            fail_keys: AtomicBool::new(false),
        }
    }

    /// Make every subsequent mutating call fail with a `StoreError`, for
    /// exercising the engine's no-rollback/rollback policies.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make key allocation fail with a `StoreError`, for exercising the
    /// order-creation rollback path.
    pub fn fail_keys(&self, fail: bool) {
        self.fail_keys.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::new("injected write failure"));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::new(format!("store lock poisoned: {e}")))
    }

    /// Notify every live subscriber whose node could have been affected by a
    /// change at `changed` (itself, an ancestor, or a descendant path).
    fn notify(inner: &mut MemoryInner, changed: &str) {
        inner
            .subscribers
            .retain(|sub| !sub.cancel.is_cancelled() && !sub.tx.is_closed());
        for sub in &inner.subscribers {
            if paths_overlap(&sub.path, changed) {
                let snapshot = node_at(&inner.root, &sub.path).cloned();
                let _ = sub.tx.send(snapshot);
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn paths_overlap(a: &str, b: &str) -> bool {
    let a: Vec<&str> = segments(a).collect();
    let b: Vec<&str> = segments(b).collect();
    let shared = a.len().min(b.len());
    a[..shared] == b[..shared]
}

fn node_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments(path) {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

/// Walk to `path`, creating intermediate objects, and return the final node.
fn node_at_mut_create<'a>(root: &'a mut Value, path: &str) -> Result<&'a mut Value, StoreError> {
    let mut node = root;
    for segment in segments(path) {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let map = node
            .as_object_mut()
            .ok_or_else(|| StoreError::new(format!("path {path} is not addressable")))?;
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(node)
}

impl OrderStore for MemoryStore {
    async fn generate_key(&self, _parent: &str) -> Result<String, StoreError> {
        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(StoreError::new("injected key allocation failure"));
        }
        Ok(Uuid::new_v4().to_string())
    }

    async fn read_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.lock()?;
        Ok(node_at(&inner.root, path).cloned())
    }

    fn subscribe(&self, path: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Initial snapshot is delivered immediately.
        let _ = tx.send(node_at(&inner.root, path).cloned());
        inner.subscribers.push(Subscriber {
            path: path.to_string(),
            tx,
            cancel: cancel.clone(),
        });
        debug!(path, "subscription attached");
        Subscription { rx, cancel }
    }

    async fn write_whole(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock()?;
        *node_at_mut_create(&mut inner.root, path)? = value;
        MemoryStore::notify(&mut inner, path);
        Ok(())
    }

    async fn write_partial(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock()?;
        let node = node_at_mut_create(&mut inner.root, path)?;
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let map = node
            .as_object_mut()
            .ok_or_else(|| StoreError::new(format!("path {path} is not a document")))?;
        for (key, value) in fields {
            if value.is_null() {
                map.remove(&key);
            } else {
                map.insert(key, value);
            }
        }
        MemoryStore::notify(&mut inner, path);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut inner = self.lock()?;
        let parts: Vec<&str> = segments(path).collect();
        let Some((leaf, ancestors)) = parts.split_last() else {
            inner.root = Value::Object(Map::new());
            MemoryStore::notify(&mut inner, path);
            return Ok(());
        };
        let mut node = &mut inner.root;
        for segment in ancestors {
            match node.as_object_mut().and_then(|m| m.get_mut(*segment)) {
                Some(next) => node = next,
                None => return Ok(()), // nothing to delete
            }
        }
        if let Some(map) = node.as_object_mut() {
            map.remove(*leaf);
        }
        MemoryStore::notify(&mut inner, path);
        Ok(())
    }
}
