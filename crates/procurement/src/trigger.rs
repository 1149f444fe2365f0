use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boardstock_core::{ComponentId, Error, Result, TriggerId};

/// Reorder trigger point: 20% of the component's monthly demand, rounded up.
pub fn reorder_threshold(monthly_required_quantity: i64) -> i64 {
    (monthly_required_quantity.max(0) + 4) / 5
}

/// Whether a component's stock has fallen below its reorder threshold.
pub fn needs_reorder(current_stock: i64, monthly_required_quantity: i64) -> bool {
    current_stock < reorder_threshold(monthly_required_quantity)
}

/// Trigger lifecycle. PENDING → RESOLVED is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerStatus {
    Pending,
    Resolved,
}

impl TriggerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerStatus::Pending => "PENDING",
            TriggerStatus::Resolved => "RESOLVED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(TriggerStatus::Pending),
            "RESOLVED" => Ok(TriggerStatus::Resolved),
            other => Err(Error::validation(format!(
                "unknown trigger status: {other}"
            ))),
        }
    }
}

/// Validated input for resolving a trigger against a received purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResolution {
    pub quantity_received: i64,
    pub po_reference: String,
}

impl TriggerResolution {
    pub fn validate(&self) -> Result<()> {
        if self.quantity_received <= 0 {
            return Err(Error::validation("quantity_received must be positive"));
        }
        if self.po_reference.trim().is_empty() {
            return Err(Error::validation("po_reference cannot be empty"));
        }
        Ok(())
    }
}

/// An open or closed reorder need for one component.
///
/// The stock/demand/threshold fields are snapshots taken when the trigger
/// opened; `stock_at_resolution` and `po_reference` are only ever set by the
/// resolving transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub component_id: ComponentId,
    pub stock_at_trigger: i64,
    pub monthly_required_quantity: i64,
    pub threshold: i64,
    pub status: TriggerStatus,
    pub po_reference: Option<String>,
    pub stock_at_resolution: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Trigger {
    /// Open a new PENDING trigger snapshotting the component's standing.
    pub fn open(
        component_id: ComponentId,
        current_stock: i64,
        monthly_required_quantity: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TriggerId::new(),
            component_id,
            stock_at_trigger: current_stock,
            monthly_required_quantity,
            threshold: reorder_threshold(monthly_required_quantity),
            status: TriggerStatus::Pending,
            po_reference: None,
            stock_at_resolution: None,
            created_at: now,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TriggerStatus::Pending
    }

    /// The one-way PENDING → RESOLVED transition.
    ///
    /// `stock_before_receipt` is the component's stock immediately before
    /// the received quantity is added. Consumes the trigger so a resolved
    /// value can never be transitioned again; a non-pending input is
    /// rejected with the not-found-family error.
    pub fn resolve(
        self,
        resolution: &TriggerResolution,
        stock_before_receipt: i64,
        now: DateTime<Utc>,
    ) -> Result<Trigger> {
        resolution.validate()?;
        if self.status != TriggerStatus::Pending {
            return Err(Error::not_found());
        }
        Ok(Trigger {
            status: TriggerStatus::Resolved,
            po_reference: Some(resolution.po_reference.clone()),
            stock_at_resolution: Some(stock_before_receipt),
            resolved_at: Some(now),
            ..self
        })
    }
}
