//! Error taxonomy shared across the engine.

use thiserror::Error;

use crate::shortfall::Shortfall;

/// Result type used across the domain and persistence layers.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine-level error.
///
/// `InsufficientStock` is an expected, client-actionable business outcome and
/// carries the full structured shortfall list; `Transaction` is an opaque
/// persistence fault that always implies a rollback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A value failed validation (malformed, missing, non-positive input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced PCB/component/trigger is absent, or a trigger is no
    /// longer in a state the operation accepts.
    #[error("not found")]
    NotFound,

    /// A uniqueness violation (part number, PCB code, BOM mapping) or a
    /// concurrent-write conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// At least one BOM line cannot be covered by the target component's
    /// stock. The production request was rejected as a whole.
    #[error("insufficient stock for {} component(s)", .0.len())]
    InsufficientStock(Vec<Shortfall>),

    /// Unexpected persistence failure; the in-flight transaction was rolled
    /// back and no partial state is visible.
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    pub fn insufficient_stock(shortfalls: Vec<Shortfall>) -> Self {
        Self::InsufficientStock(shortfalls)
    }
}
