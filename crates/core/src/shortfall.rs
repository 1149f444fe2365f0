//! Shortfall descriptors returned when a production request is rejected.
//!
//! These are wire-facing value objects: the caller uses them to decide
//! whether to retry the request with explicit substitutions toggled.

use serde::{Deserialize, Serialize};

use crate::id::ComponentId;

/// An approved substitute offered alongside a shortfall.
///
/// Attached whenever the insufficient target was the BOM line's primary and
/// an alternative is configured — regardless of whether the alternative
/// itself has enough stock. The caller decides whether to substitute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeSuggestion {
    pub component_id: ComponentId,
    pub component_name: String,
    pub part_number: String,
    pub current_stock: i64,
}

impl AlternativeSuggestion {
    /// Whether this substitute alone could cover the required quantity.
    pub fn covers(&self, required: i64) -> bool {
        self.current_stock >= required
    }
}

/// One BOM line the stock ledger cannot cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    /// Primary component id of the BOM line (for client correlation, even
    /// when the insufficient target was the alternative).
    pub component_id: ComponentId,
    pub component_name: String,
    pub part_number: String,
    /// Stock of the component that was actually targeted.
    pub current_stock: i64,
    pub required: i64,
    /// `required - current_stock`, always positive.
    pub shortfall: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative: Option<AlternativeSuggestion>,
}
