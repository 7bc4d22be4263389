//! Error taxonomy for the order engine.
//!
//! Every fallible engine operation returns [`EngineError`]; nothing in this
//! crate panics on bad input or a failed store call. Store failures carry the
//! backend's message verbatim so the caller can surface it as a non-fatal
//! notification.

use thiserror::Error;

/// Failure reported by the shared order store backend.
///
/// The engine treats the store as opaque: the payload is a human-readable
/// message, not a retryable error code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("store: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Engine-level errors.
///
/// Recovery semantics:
/// - `Validation` — rejected operation, no state changed.
/// - `NotFound` — referenced order absent remotely; local state for it is
///   cleared by the caller that hit it.
/// - `Store` — write/read failure. Item mutations keep their optimistic
///   local state; order creation rolls the active-order pointer back.
/// - `EmptyOrder` / `NoActiveOrder` — block finalization only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("order has no items")]
    EmptyOrder,

    #[error("no active order")]
    NoActiveOrder,
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_is_transparent_in_engine_error() {
        let err: EngineError = StoreError::new("connection reset").into();
        assert_eq!(err.to_string(), "store: connection reset");
    }

    #[test]
    fn validation_message_is_preserved() {
        let err = EngineError::validation("quantity must be positive");
        assert_eq!(err.to_string(), "invalid input: quantity must be positive");
    }
}
