use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boardstock_bom::{PlannedConsumption, Substitutions};
use boardstock_core::{
    ComponentId, ConsumptionRecordId, Error, PcbId, ProductionEntryId, Result, UserId,
};

/// A request to produce N units of a PCB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRequest {
    pub pcb_id: PcbId,
    pub quantity_produced: i64,
    #[serde(default)]
    pub substitutions: Substitutions,
    pub produced_by: UserId,
}

impl ProductionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.quantity_produced <= 0 {
            return Err(Error::validation("quantity_produced must be positive"));
        }
        Ok(())
    }
}

/// One committed production run. Created exactly once per successful
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionEntry {
    pub id: ProductionEntryId,
    pub pcb_id: PcbId,
    pub quantity_produced: i64,
    pub produced_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl ProductionEntry {
    pub fn new(
        pcb_id: PcbId,
        quantity_produced: i64,
        produced_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProductionEntryId::new(),
            pcb_id,
            quantity_produced,
            produced_by,
            created_at: now,
        }
    }
}

/// One deduction in the consumption audit trail.
///
/// `stock_after = stock_before − quantity_consumed` by construction;
/// `stock_before` must be the component's stock immediately prior to the
/// deduction within the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub id: ConsumptionRecordId,
    pub production_entry_id: ProductionEntryId,
    pub component_id: ComponentId,
    pub quantity_consumed: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub created_at: DateTime<Utc>,
}

impl ConsumptionRecord {
    /// Build the record for one planned deduction.
    ///
    /// Rejects a plan item that would drive stock negative; the stores keep
    /// a constraint-level backstop for the same invariant.
    pub fn for_deduction(
        production_entry_id: ProductionEntryId,
        item: &PlannedConsumption,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let stock_after = item.stock_before - item.quantity;
        if stock_after < 0 {
            return Err(Error::conflict(format!(
                "deduction of {} from stock {} would go negative",
                item.quantity, item.stock_before
            )));
        }
        Ok(Self {
            id: ConsumptionRecordId::new(),
            production_entry_id,
            component_id: item.component_id,
            quantity_consumed: item.quantity,
            stock_before: item.stock_before,
            stock_after,
            created_at: now,
        })
    }
}

/// The committed outcome of one production request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionReceipt {
    pub entry: ProductionEntry,
    pub consumption: Vec<ConsumptionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_quantity_must_be_positive() {
        let request = ProductionRequest {
            pcb_id: PcbId::new(),
            quantity_produced: 0,
            substitutions: Substitutions::none(),
            produced_by: UserId::new(),
        };
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn consumption_record_tracks_stock_trajectory() {
        let item = PlannedConsumption {
            component_id: ComponentId::new(),
            quantity: 30,
            stock_before: 100,
        };
        let record =
            ConsumptionRecord::for_deduction(ProductionEntryId::new(), &item, Utc::now()).unwrap();
        assert_eq!(record.stock_after, 70);
        assert_eq!(record.stock_after, record.stock_before - record.quantity_consumed);
    }

    #[test]
    fn consumption_record_refuses_negative_stock() {
        let item = PlannedConsumption {
            component_id: ComponentId::new(),
            quantity: 101,
            stock_before: 100,
        };
        let result = ConsumptionRecord::for_deduction(ProductionEntryId::new(), &item, Utc::now());
        assert!(matches!(result, Err(Error::Conflict(_))));
    }
}
