use serde::{Deserialize, Serialize};

use boardstock_core::{BomLineId, ComponentId, Error, PcbId, Result};

/// One BOM line: how many units of a component a single PCB unit consumes,
/// and which approved substitute (if any) may stand in for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    pub id: BomLineId,
    pub pcb_id: PcbId,
    pub component_id: ComponentId,
    pub quantity_per_unit: i64,
    pub alternative_component_id: Option<ComponentId>,
}

/// Input for one BOM line when (re)defining a PCB's component mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBomLine {
    pub component_id: ComponentId,
    pub quantity_per_unit: i64,
    #[serde(default)]
    pub alternative_component_id: Option<ComponentId>,
}

impl NewBomLine {
    pub fn validate(&self) -> Result<()> {
        if self.quantity_per_unit <= 0 {
            return Err(Error::validation("quantity_per_unit must be positive"));
        }
        if self.alternative_component_id == Some(self.component_id) {
            return Err(Error::validation(
                "alternative component must differ from the primary",
            ));
        }
        Ok(())
    }

    pub fn into_line(self, pcb_id: PcbId) -> Result<BomLine> {
        self.validate()?;
        Ok(BomLine {
            id: BomLineId::new(),
            pcb_id,
            component_id: self.component_id,
            quantity_per_unit: self.quantity_per_unit,
            alternative_component_id: self.alternative_component_id,
        })
    }
}

/// Validate a full BOM definition: each line valid, one line per component.
pub fn validate_lines(lines: &[NewBomLine]) -> Result<()> {
    for line in lines {
        line.validate()?;
    }
    let mut seen = std::collections::HashSet::new();
    for line in lines {
        if !seen.insert(line.component_id) {
            return Err(Error::conflict(format!(
                "duplicate BOM line for component {}",
                line.component_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(component_id: ComponentId, qty: i64) -> NewBomLine {
        NewBomLine {
            component_id,
            quantity_per_unit: qty,
            alternative_component_id: None,
        }
    }

    #[test]
    fn rejects_non_positive_quantity() {
        assert!(line(ComponentId::new(), 0).validate().is_err());
        assert!(line(ComponentId::new(), -3).validate().is_err());
        assert!(line(ComponentId::new(), 1).validate().is_ok());
    }

    #[test]
    fn rejects_self_referential_alternative() {
        let id = ComponentId::new();
        let mut input = line(id, 2);
        input.alternative_component_id = Some(id);
        assert!(matches!(input.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_duplicate_component_mapping() {
        let id = ComponentId::new();
        let lines = vec![line(id, 1), line(id, 4)];
        assert!(matches!(validate_lines(&lines), Err(Error::Conflict(_))));
    }
}
