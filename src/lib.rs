//! Order lifecycle & synchronization engine for a small point of sale.
//!
//! Orders live in a shared, continuously synchronized document store (a
//! Firebase-style realtime database in production) reachable from several
//! terminals at once. This crate owns the order semantics on top of that
//! store: the item ledger of the order being taken, the session around it,
//! status and payment reconciliation, elapsed-time classification, debounced
//! free-text persistence, and the subscription-driven order board. The UI
//! and the storage engine itself stay outside.
//!
//! Conflict policy is last-write-wins throughout; mutations are optimistic
//! (local state first, then the store write) and every failure is an error
//! value, never a panic.

pub mod board;
pub mod catalog;
pub mod clock;
pub mod codec;
pub mod debounce;
pub mod error;
pub mod ledger;
pub mod model;
pub mod reconciler;
pub mod session;
pub mod store;

pub use board::{BoardEntry, OrderBoard};
pub use debounce::DebouncedField;
pub use error::{EngineError, StoreError};
pub use ledger::ItemLedger;
pub use model::{Order, OrderItem, OrderStatus, PaymentClassification, Product, EPSILON};
pub use reconciler::Reconciler;
pub use session::{FinalizeOutcome, OrderSession};
pub use store::{MemoryStore, OrderStore, Subscription};
