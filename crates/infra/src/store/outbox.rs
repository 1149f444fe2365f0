//! Trigger-check outbox types.
//!
//! Procurement checks run after a production commit, never inside it. Each
//! consumed component gets one outbox task written in the same transaction
//! as the production itself, so a crash between commit and check leaves the
//! task queued instead of silently dropping the check. Failures are recorded
//! on the task row and are inspectable; they never affect the committed
//! production.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use boardstock_core::{ComponentId, ProductionEntryId};

/// Unique outbox task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One queued procurement check for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCheckTask {
    pub id: TaskId,
    /// Set when the task was enqueued by a production commit; `None` for
    /// checks queued by master-data edits.
    pub production_entry_id: Option<ProductionEntryId>,
    pub component_id: ComponentId,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl TriggerCheckTask {
    pub fn new(
        production_entry_id: Option<ProductionEntryId>,
        component_id: ComponentId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            production_entry_id,
            component_id,
            attempts: 0,
            last_error: None,
            created_at: now,
            processed_at: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}
