//! The storage contract: `StockStore` + the `StockTx` unit of work.

use async_trait::async_trait;

use boardstock_catalog::{BomLine, Component, ComponentPatch, NewBomLine, Pcb, PcbPatch};
use boardstock_core::{ComponentId, PcbId, ProductionEntryId, Result, TriggerId};
use boardstock_procurement::Trigger;
use boardstock_production::{ConsumptionRecord, ProductionEntry};

use super::outbox::{TaskId, TriggerCheckTask};

/// Filter for component listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentFilter {
    /// Case-insensitive substring match on name or part number.
    pub search: Option<String>,
    /// Only components whose stock is below the reorder threshold.
    pub low_stock_only: bool,
}

/// A trigger joined with the component it concerns, for listings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TriggerListItem {
    #[serde(flatten)]
    pub trigger: Trigger,
    pub component_name: String,
    pub part_number: String,
}

/// A production entry joined with PCB identity, for history listings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProductionHistoryItem {
    #[serde(flatten)]
    pub entry: ProductionEntry,
    pub pcb_name: String,
    pub pcb_code: String,
}

/// A consumption record joined with component identity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConsumptionDetail {
    #[serde(flatten)]
    pub record: ConsumptionRecord,
    pub component_name: String,
    pub part_number: String,
}

/// One unit of work against the ledger.
///
/// Acquired from [`StockStore::begin`], scoped to exactly one production or
/// resolution call, and released deterministically: `commit`/`rollback`
/// consume the handle, and dropping it without committing discards every
/// staged write. All mutations of `components.current_stock` anywhere in the
/// system go through a handle of this type.
#[async_trait]
pub trait StockTx: Send {
    /// BOM lines for a PCB, read within this unit of work.
    async fn bom_lines(&mut self, pcb_id: PcbId) -> Result<Vec<BomLine>>;

    /// Lock the given component rows for the rest of this unit of work and
    /// return them in ascending id order (the stable lock order that keeps
    /// concurrent multi-component requests deadlock-free). Unknown ids are
    /// simply absent from the result.
    async fn lock_components(&mut self, ids: &[ComponentId]) -> Result<Vec<Component>>;

    async fn insert_production_entry(&mut self, entry: &ProductionEntry) -> Result<()>;

    /// Deduct from a previously locked component row; returns the new stock
    /// level. Driving stock negative is a transaction fault (the sufficiency
    /// check runs before any deduction).
    async fn deduct_stock(&mut self, id: ComponentId, quantity: i64) -> Result<i64>;

    /// Add received stock to a previously locked component row; returns the
    /// new stock level.
    async fn restock(&mut self, id: ComponentId, quantity: i64) -> Result<i64>;

    async fn insert_consumption(&mut self, record: &ConsumptionRecord) -> Result<()>;

    async fn enqueue_trigger_check(&mut self, task: &TriggerCheckTask) -> Result<()>;

    /// Load a trigger, locking its row for the rest of this unit of work so
    /// concurrent resolutions serialize.
    async fn get_trigger(&mut self, id: TriggerId) -> Result<Option<Trigger>>;

    async fn find_pending_trigger(&mut self, component_id: ComponentId)
    -> Result<Option<Trigger>>;

    /// Insert a PENDING trigger. A concurrent duplicate for the same
    /// component surfaces as `Error::Conflict` (at-most-one-pending).
    async fn insert_trigger(&mut self, trigger: &Trigger) -> Result<()>;

    async fn update_trigger(&mut self, trigger: &Trigger) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// The stock ledger storage boundary.
///
/// Engine operations (produce, trigger check, trigger resolution) run inside
/// a [`StockTx`]; everything else is a read path or single-statement master
/// data operation that each backend keeps internally atomic.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StockTx>>;

    // Master data: components.
    async fn insert_component(&self, component: Component) -> Result<Component>;
    async fn get_component(&self, id: ComponentId) -> Result<Option<Component>>;
    async fn list_components(&self, filter: ComponentFilter) -> Result<Vec<Component>>;
    async fn update_component(&self, id: ComponentId, patch: ComponentPatch)
    -> Result<Component>;
    async fn delete_component(&self, id: ComponentId) -> Result<()>;

    // Master data: PCBs and their BOM.
    async fn insert_pcb(&self, pcb: Pcb) -> Result<Pcb>;
    async fn get_pcb(&self, id: PcbId) -> Result<Option<Pcb>>;
    async fn list_pcbs(&self) -> Result<Vec<Pcb>>;
    async fn update_pcb(&self, id: PcbId, patch: PcbPatch) -> Result<Pcb>;
    async fn delete_pcb(&self, id: PcbId) -> Result<()>;
    /// Replace a PCB's BOM atomically. Every referenced component must
    /// exist; at most one line per primary component.
    async fn replace_bom_lines(&self, pcb_id: PcbId, lines: Vec<NewBomLine>)
    -> Result<Vec<BomLine>>;
    async fn bom_lines_for_pcb(&self, pcb_id: PcbId) -> Result<Vec<BomLine>>;

    // Read paths consumed by the HTTP surface.
    async fn list_triggers(&self) -> Result<Vec<TriggerListItem>>;
    async fn get_production_entry(&self, id: ProductionEntryId)
    -> Result<Option<ProductionEntry>>;
    async fn production_history(&self, limit: i64) -> Result<Vec<ProductionHistoryItem>>;
    async fn consumption_for_entry(&self, entry: ProductionEntryId)
    -> Result<Vec<ConsumptionDetail>>;

    // Trigger-check outbox.
    async fn due_trigger_checks(&self, limit: i64) -> Result<Vec<TriggerCheckTask>>;
    async fn trigger_checks_for_entry(&self, entry: ProductionEntryId)
    -> Result<Vec<TriggerCheckTask>>;
    async fn complete_trigger_check(&self, id: TaskId) -> Result<()>;
    async fn record_trigger_check_failure(&self, id: TaskId, error: &str) -> Result<()>;
}
