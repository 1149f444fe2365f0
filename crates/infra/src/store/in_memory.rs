//! In-memory stock store.
//!
//! Intended for tests/dev. One store-wide async mutex is held for the life
//! of each unit of work, which makes every transaction serializable by
//! construction; writes land on a staged copy of the state that is swapped
//! in on commit and discarded on rollback/drop.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use boardstock_catalog::{
    BomLine, Component, ComponentPatch, NewBomLine, Pcb, PcbPatch, bom_line::validate_lines,
};
use boardstock_core::{ComponentId, Error, PcbId, ProductionEntryId, Result, TriggerId};
use boardstock_procurement::{Trigger, needs_reorder};
use boardstock_production::{ConsumptionRecord, ProductionEntry};

use super::outbox::{TaskId, TriggerCheckTask};
use super::r#trait::{
    ComponentFilter, ConsumptionDetail, ProductionHistoryItem, StockStore, StockTx,
    TriggerListItem,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    components: Vec<Component>,
    pcbs: Vec<Pcb>,
    bom_lines: Vec<BomLine>,
    production_entries: Vec<ProductionEntry>,
    consumption: Vec<ConsumptionRecord>,
    triggers: Vec<Trigger>,
    outbox: Vec<TriggerCheckTask>,
}

impl MemoryState {
    fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id == id)
    }

    fn pcb(&self, id: PcbId) -> Option<&Pcb> {
        self.pcbs.iter().find(|p| p.id == id)
    }
}

/// In-memory implementation of [`StockStore`].
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StockTx for InMemoryTx {
    async fn bom_lines(&mut self, pcb_id: PcbId) -> Result<Vec<BomLine>> {
        Ok(self
            .staged
            .bom_lines
            .iter()
            .filter(|l| l.pcb_id == pcb_id)
            .cloned()
            .collect())
    }

    async fn lock_components(&mut self, ids: &[ComponentId]) -> Result<Vec<Component>> {
        let wanted: HashSet<ComponentId> = ids.iter().copied().collect();
        let mut rows: Vec<Component> = self
            .staged
            .components
            .iter()
            .filter(|c| wanted.contains(&c.id))
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    async fn insert_production_entry(&mut self, entry: &ProductionEntry) -> Result<()> {
        self.staged.production_entries.push(entry.clone());
        Ok(())
    }

    async fn deduct_stock(&mut self, id: ComponentId, quantity: i64) -> Result<i64> {
        let component = self
            .staged
            .component_mut(id)
            .ok_or_else(Error::not_found)?;
        let next = component.current_stock - quantity;
        if next < 0 {
            return Err(Error::transaction(format!(
                "deduction of {quantity} would drive component {id} below zero"
            )));
        }
        component.current_stock = next;
        component.updated_at = Utc::now();
        Ok(next)
    }

    async fn restock(&mut self, id: ComponentId, quantity: i64) -> Result<i64> {
        let component = self
            .staged
            .component_mut(id)
            .ok_or_else(Error::not_found)?;
        component.current_stock += quantity;
        component.updated_at = Utc::now();
        Ok(component.current_stock)
    }

    async fn insert_consumption(&mut self, record: &ConsumptionRecord) -> Result<()> {
        self.staged.consumption.push(record.clone());
        Ok(())
    }

    async fn enqueue_trigger_check(&mut self, task: &TriggerCheckTask) -> Result<()> {
        self.staged.outbox.push(task.clone());
        Ok(())
    }

    async fn get_trigger(&mut self, id: TriggerId) -> Result<Option<Trigger>> {
        Ok(self.staged.triggers.iter().find(|t| t.id == id).cloned())
    }

    async fn find_pending_trigger(
        &mut self,
        component_id: ComponentId,
    ) -> Result<Option<Trigger>> {
        Ok(self
            .staged
            .triggers
            .iter()
            .find(|t| t.component_id == component_id && t.is_pending())
            .cloned())
    }

    async fn insert_trigger(&mut self, trigger: &Trigger) -> Result<()> {
        if trigger.is_pending()
            && self
                .staged
                .triggers
                .iter()
                .any(|t| t.component_id == trigger.component_id && t.is_pending())
        {
            return Err(Error::conflict(format!(
                "a pending trigger already exists for component {}",
                trigger.component_id
            )));
        }
        self.staged.triggers.push(trigger.clone());
        Ok(())
    }

    async fn update_trigger(&mut self, trigger: &Trigger) -> Result<()> {
        let slot = self
            .staged
            .triggers
            .iter_mut()
            .find(|t| t.id == trigger.id)
            .ok_or_else(Error::not_found)?;
        *slot = trigger.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn begin(&self) -> Result<Box<dyn StockTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTx { guard, staged }))
    }

    async fn insert_component(&self, component: Component) -> Result<Component> {
        let mut state = self.state.lock().await;
        if state
            .components
            .iter()
            .any(|c| c.part_number == component.part_number)
        {
            return Err(Error::conflict("part number already exists"));
        }
        state.components.push(component.clone());
        Ok(component)
    }

    async fn get_component(&self, id: ComponentId) -> Result<Option<Component>> {
        Ok(self.state.lock().await.component(id).cloned())
    }

    async fn list_components(&self, filter: ComponentFilter) -> Result<Vec<Component>> {
        let state = self.state.lock().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Component> = state
            .components
            .iter()
            .filter(|c| {
                needle.as_deref().is_none_or(|n| {
                    c.name.to_lowercase().contains(n) || c.part_number.to_lowercase().contains(n)
                })
            })
            .filter(|c| {
                !filter.low_stock_only
                    || needs_reorder(c.current_stock, c.monthly_required_quantity)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_component(
        &self,
        id: ComponentId,
        patch: ComponentPatch,
    ) -> Result<Component> {
        patch.validate()?;
        let mut state = self.state.lock().await;
        if let Some(part_number) = &patch.part_number {
            if state
                .components
                .iter()
                .any(|c| c.id != id && &c.part_number == part_number)
            {
                return Err(Error::conflict("part number already exists"));
            }
        }
        let component = state.component_mut(id).ok_or_else(Error::not_found)?;
        patch.apply(component, Utc::now())?;
        Ok(component.clone())
    }

    async fn delete_component(&self, id: ComponentId) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.component(id).is_none() {
            return Err(Error::not_found());
        }
        if state.consumption.iter().any(|r| r.component_id == id) {
            return Err(Error::conflict(
                "component is referenced by consumption history",
            ));
        }
        if state.triggers.iter().any(|t| t.component_id == id) {
            return Err(Error::conflict(
                "component is referenced by procurement triggers",
            ));
        }
        state.components.retain(|c| c.id != id);
        state.bom_lines.retain(|l| l.component_id != id);
        for line in &mut state.bom_lines {
            if line.alternative_component_id == Some(id) {
                line.alternative_component_id = None;
            }
        }
        state.outbox.retain(|t| t.component_id != id);
        Ok(())
    }

    async fn insert_pcb(&self, pcb: Pcb) -> Result<Pcb> {
        let mut state = self.state.lock().await;
        if state.pcbs.iter().any(|p| p.code == pcb.code) {
            return Err(Error::conflict("pcb code already exists"));
        }
        state.pcbs.push(pcb.clone());
        Ok(pcb)
    }

    async fn get_pcb(&self, id: PcbId) -> Result<Option<Pcb>> {
        Ok(self.state.lock().await.pcb(id).cloned())
    }

    async fn list_pcbs(&self) -> Result<Vec<Pcb>> {
        let state = self.state.lock().await;
        let mut rows = state.pcbs.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_pcb(&self, id: PcbId, patch: PcbPatch) -> Result<Pcb> {
        patch.validate()?;
        let mut state = self.state.lock().await;
        if let Some(code) = &patch.code {
            if state.pcbs.iter().any(|p| p.id != id && &p.code == code) {
                return Err(Error::conflict("pcb code already exists"));
            }
        }
        let pcb = state
            .pcbs
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(Error::not_found)?;
        patch.apply(pcb)?;
        Ok(pcb.clone())
    }

    async fn delete_pcb(&self, id: PcbId) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.pcb(id).is_none() {
            return Err(Error::not_found());
        }
        if state.production_entries.iter().any(|e| e.pcb_id == id) {
            return Err(Error::conflict("pcb is referenced by production history"));
        }
        state.pcbs.retain(|p| p.id != id);
        state.bom_lines.retain(|l| l.pcb_id != id);
        Ok(())
    }

    async fn replace_bom_lines(
        &self,
        pcb_id: PcbId,
        lines: Vec<NewBomLine>,
    ) -> Result<Vec<BomLine>> {
        validate_lines(&lines)?;
        let mut state = self.state.lock().await;
        if state.pcb(pcb_id).is_none() {
            return Err(Error::not_found());
        }
        for line in &lines {
            if state.component(line.component_id).is_none() {
                return Err(Error::validation(format!(
                    "unknown component {} in BOM line",
                    line.component_id
                )));
            }
            if let Some(alt) = line.alternative_component_id {
                if state.component(alt).is_none() {
                    return Err(Error::validation(format!(
                        "unknown alternative component {alt} in BOM line"
                    )));
                }
            }
        }
        let mut inserted = Vec::with_capacity(lines.len());
        for line in lines {
            inserted.push(line.into_line(pcb_id)?);
        }
        state.bom_lines.retain(|l| l.pcb_id != pcb_id);
        state.bom_lines.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn bom_lines_for_pcb(&self, pcb_id: PcbId) -> Result<Vec<BomLine>> {
        Ok(self
            .state
            .lock()
            .await
            .bom_lines
            .iter()
            .filter(|l| l.pcb_id == pcb_id)
            .cloned()
            .collect())
    }

    async fn list_triggers(&self) -> Result<Vec<TriggerListItem>> {
        let state = self.state.lock().await;
        let mut rows: Vec<TriggerListItem> = state
            .triggers
            .iter()
            .filter_map(|t| {
                state.component(t.component_id).map(|c| TriggerListItem {
                    trigger: t.clone(),
                    component_name: c.name.clone(),
                    part_number: c.part_number.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.trigger.created_at.cmp(&a.trigger.created_at));
        Ok(rows)
    }

    async fn get_production_entry(
        &self,
        id: ProductionEntryId,
    ) -> Result<Option<ProductionEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .production_entries
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn production_history(&self, limit: i64) -> Result<Vec<ProductionHistoryItem>> {
        let state = self.state.lock().await;
        let mut rows: Vec<ProductionHistoryItem> = state
            .production_entries
            .iter()
            .filter_map(|e| {
                state.pcb(e.pcb_id).map(|p| ProductionHistoryItem {
                    entry: e.clone(),
                    pcb_name: p.name.clone(),
                    pcb_code: p.code.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.entry.created_at.cmp(&a.entry.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn consumption_for_entry(
        &self,
        entry: ProductionEntryId,
    ) -> Result<Vec<ConsumptionDetail>> {
        let state = self.state.lock().await;
        let mut rows: Vec<ConsumptionDetail> = state
            .consumption
            .iter()
            .filter(|r| r.production_entry_id == entry)
            .filter_map(|r| {
                state.component(r.component_id).map(|c| ConsumptionDetail {
                    record: r.clone(),
                    component_name: c.name.clone(),
                    part_number: c.part_number.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.component_name.cmp(&b.component_name));
        Ok(rows)
    }

    async fn due_trigger_checks(&self, limit: i64) -> Result<Vec<TriggerCheckTask>> {
        let state = self.state.lock().await;
        let mut rows: Vec<TriggerCheckTask> = state
            .outbox
            .iter()
            .filter(|t| !t.is_processed())
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn trigger_checks_for_entry(
        &self,
        entry: ProductionEntryId,
    ) -> Result<Vec<TriggerCheckTask>> {
        Ok(self
            .state
            .lock()
            .await
            .outbox
            .iter()
            .filter(|t| t.production_entry_id == Some(entry) && !t.is_processed())
            .cloned()
            .collect())
    }

    async fn complete_trigger_check(&self, id: TaskId) -> Result<()> {
        let mut state = self.state.lock().await;
        let task = state
            .outbox
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(Error::not_found)?;
        task.attempts += 1;
        task.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn record_trigger_check_failure(&self, id: TaskId, error: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let task = state
            .outbox
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(Error::not_found)?;
        task.attempts += 1;
        task.last_error = Some(error.to_string());
        Ok(())
    }
}
