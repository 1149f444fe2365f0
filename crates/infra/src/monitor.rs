//! The procurement monitor: reorder trigger creation and resolution.
//!
//! Trigger checks run in their own unit of work, after (never inside) the
//! production transaction that queued them. Resolution increments stock and
//! closes the trigger in one transaction; the PENDING → RESOLVED transition
//! itself lives in `boardstock-procurement` and is one-way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use boardstock_core::{ComponentId, Error, ProductionEntryId, Result, TriggerId};
use boardstock_procurement::{Trigger, TriggerResolution, needs_reorder};

use crate::store::{StockStore, StockTx, TriggerCheckTask};

/// Watches component stock against reorder thresholds.
pub struct ProcurementMonitor {
    store: Arc<dyn StockStore>,
}

impl ProcurementMonitor {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Evaluate one component against its reorder threshold, opening a
    /// PENDING trigger if stock is below it and none is already open.
    ///
    /// Idempotent: repeated calls under unchanged conditions never create
    /// duplicates. Returns the trigger that was opened, if any.
    #[instrument(skip(self), fields(component_id = %component_id))]
    pub async fn check_component(&self, component_id: ComponentId) -> Result<Option<Trigger>> {
        let mut tx = self.store.begin().await?;
        match Self::check_in_tx(tx.as_mut(), component_id, Utc::now()).await {
            Ok(opened) => {
                tx.commit().await?;
                if let Some(trigger) = &opened {
                    tracing::info!(
                        trigger_id = %trigger.id,
                        stock = trigger.stock_at_trigger,
                        threshold = trigger.threshold,
                        "opened procurement trigger"
                    );
                }
                Ok(opened)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = %rb, "rollback failed after trigger check");
                }
                Err(err)
            }
        }
    }

    async fn check_in_tx(
        tx: &mut dyn StockTx,
        component_id: ComponentId,
        now: DateTime<Utc>,
    ) -> Result<Option<Trigger>> {
        let locked = tx.lock_components(&[component_id]).await?;
        let Some(component) = locked.into_iter().next() else {
            // The component disappeared between enqueue and check.
            return Ok(None);
        };

        if !needs_reorder(component.current_stock, component.monthly_required_quantity) {
            return Ok(None);
        }
        if tx.find_pending_trigger(component_id).await?.is_some() {
            return Ok(None);
        }

        let trigger = Trigger::open(
            component_id,
            component.current_stock,
            component.monthly_required_quantity,
            now,
        );
        match tx.insert_trigger(&trigger).await {
            Ok(()) => Ok(Some(trigger)),
            // Lost the race to another check; the pending trigger exists.
            Err(Error::Conflict(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Resolve a PENDING trigger against a received purchase order:
    /// increments the component's stock by `quantity_received` and closes
    /// the trigger, recording the stock level before the receipt.
    #[instrument(skip(self, resolution), fields(trigger_id = %trigger_id))]
    pub async fn resolve(
        &self,
        trigger_id: TriggerId,
        resolution: TriggerResolution,
    ) -> Result<Trigger> {
        resolution.validate()?;

        let mut tx = self.store.begin().await?;
        match Self::resolve_in_tx(tx.as_mut(), trigger_id, &resolution, Utc::now()).await {
            Ok(resolved) => {
                tx.commit().await?;
                Ok(resolved)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = %rb, "rollback failed after trigger resolution");
                }
                Err(err)
            }
        }
    }

    async fn resolve_in_tx(
        tx: &mut dyn StockTx,
        trigger_id: TriggerId,
        resolution: &TriggerResolution,
        now: DateTime<Utc>,
    ) -> Result<Trigger> {
        let trigger = tx
            .get_trigger(trigger_id)
            .await?
            .ok_or_else(Error::not_found)?;

        let locked = tx.lock_components(&[trigger.component_id]).await?;
        let component = locked.into_iter().next().ok_or_else(|| {
            Error::transaction(format!(
                "trigger {trigger_id} references missing component"
            ))
        })?;

        let resolved = trigger.resolve(resolution, component.current_stock, now)?;
        tx.restock(resolved.component_id, resolution.quantity_received)
            .await?;
        tx.update_trigger(&resolved).await?;
        Ok(resolved)
    }

    /// Process the queued checks for one committed production run.
    /// Best-effort: failures are recorded on the task and logged, never
    /// propagated.
    pub async fn drain_for_entry(&self, entry_id: ProductionEntryId) {
        match self.store.trigger_checks_for_entry(entry_id).await {
            Ok(tasks) => self.run_tasks(tasks).await,
            Err(err) => {
                tracing::warn!(
                    entry_id = %entry_id,
                    error = %err,
                    "failed to load queued trigger checks"
                );
            }
        }
    }

    /// Process up to `limit` due checks regardless of origin. Lets a
    /// caller re-drain tasks left over from an earlier crash or failure.
    pub async fn drain_due(&self, limit: i64) {
        match self.store.due_trigger_checks(limit).await {
            Ok(tasks) => self.run_tasks(tasks).await,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load due trigger checks");
            }
        }
    }

    async fn run_tasks(&self, tasks: Vec<TriggerCheckTask>) {
        for task in tasks {
            match self.check_component(task.component_id).await {
                Ok(_) => {
                    if let Err(err) = self.store.complete_trigger_check(task.id).await {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %err,
                            "failed to mark trigger check processed"
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        task_id = %task.id,
                        component_id = %task.component_id,
                        error = %err,
                        "trigger check failed; task stays queued"
                    );
                    if let Err(rec) = self
                        .store
                        .record_trigger_check_failure(task.id, &err.to_string())
                        .await
                    {
                        tracing::warn!(
                            task_id = %task.id,
                            error = %rec,
                            "failed to record trigger check failure"
                        );
                    }
                }
            }
        }
    }
}
