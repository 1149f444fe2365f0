//! The production recorder: one request, one atomic unit of work.
//!
//! The sufficiency check and the deduction form a single critical section
//! per component: every component a request may touch is locked up front (in
//! ascending id order), the pure resolver runs on the locked snapshots, and
//! only a fully satisfiable plan is committed. A rejected or failed request
//! leaves the ledger untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use boardstock_bom::{BomRequirement, ComponentSnapshot, resolve_requirements};
use boardstock_catalog::Component;
use boardstock_core::{ComponentId, Error, Result};
use boardstock_production::{ConsumptionRecord, ProductionEntry, ProductionReceipt, ProductionRequest};

use crate::monitor::ProcurementMonitor;
use crate::store::{StockStore, StockTx, TriggerCheckTask};

/// Orchestrates production requests against the stock ledger.
pub struct ProductionRecorder {
    store: Arc<dyn StockStore>,
    monitor: ProcurementMonitor,
}

impl ProductionRecorder {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        let monitor = ProcurementMonitor::new(store.clone());
        Self { store, monitor }
    }

    /// Record the production of N units of a PCB.
    ///
    /// Returns the committed entry plus one consumption record per component
    /// deducted, or `Error::InsufficientStock` carrying the full shortfall
    /// list when any BOM line cannot be covered — in which case nothing was
    /// written anywhere. After a successful commit the queued procurement
    /// checks for the consumed components are drained best-effort; their
    /// failures never surface here.
    #[instrument(
        skip(self, request),
        fields(pcb_id = %request.pcb_id, quantity = request.quantity_produced)
    )]
    pub async fn produce(&self, request: ProductionRequest) -> Result<ProductionReceipt> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        match Self::stage(tx.as_mut(), &request, Utc::now()).await {
            Ok(receipt) => {
                tx.commit().await?;
                self.monitor.drain_for_entry(receipt.entry.id).await;
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = %rb, "rollback failed after aborted production");
                }
                Err(err)
            }
        }
    }

    /// Validate-all-then-commit-all against one open unit of work.
    async fn stage(
        tx: &mut dyn StockTx,
        request: &ProductionRequest,
        now: DateTime<Utc>,
    ) -> Result<ProductionReceipt> {
        let lines = tx.bom_lines(request.pcb_id).await?;
        if lines.is_empty() {
            return Err(Error::not_found());
        }

        // Lock every component the request may touch, alternatives included,
        // in one ordered acquisition.
        let mut ids: Vec<ComponentId> = lines
            .iter()
            .flat_map(|l| {
                std::iter::once(l.component_id).chain(l.alternative_component_id)
            })
            .collect();
        ids.sort();
        ids.dedup();

        let locked = tx.lock_components(&ids).await?;
        let by_id: HashMap<ComponentId, &Component> =
            locked.iter().map(|c| (c.id, c)).collect();

        let mut requirements = Vec::with_capacity(lines.len());
        for line in &lines {
            let primary = by_id.get(&line.component_id).ok_or_else(|| {
                Error::transaction(format!(
                    "BOM line references missing component {}",
                    line.component_id
                ))
            })?;
            let alternative = line
                .alternative_component_id
                .and_then(|id| by_id.get(&id))
                .map(|c| snapshot(c));
            requirements.push(BomRequirement {
                quantity_per_unit: line.quantity_per_unit,
                primary: snapshot(primary),
                alternative,
            });
        }

        let plan = resolve_requirements(
            &requirements,
            request.quantity_produced,
            &request.substitutions,
        )?
        .into_plan()?;

        let entry = ProductionEntry::new(
            request.pcb_id,
            request.quantity_produced,
            request.produced_by,
            now,
        );
        tx.insert_production_entry(&entry).await?;

        let mut consumption = Vec::with_capacity(plan.len());
        for item in &plan {
            let record = ConsumptionRecord::for_deduction(entry.id, item, now)?;
            let new_stock = tx.deduct_stock(item.component_id, item.quantity).await?;
            if new_stock != record.stock_after {
                return Err(Error::transaction(format!(
                    "stock for {} moved inside the critical section",
                    item.component_id
                )));
            }
            tx.insert_consumption(&record).await?;
            consumption.push(record);
        }

        for record in &consumption {
            let task = TriggerCheckTask::new(Some(entry.id), record.component_id, now);
            tx.enqueue_trigger_check(&task).await?;
        }

        Ok(ProductionReceipt { entry, consumption })
    }
}

fn snapshot(component: &Component) -> ComponentSnapshot {
    ComponentSnapshot {
        id: component.id,
        name: component.name.clone(),
        part_number: component.part_number.clone(),
        current_stock: component.current_stock,
    }
}
