use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boardstock_core::{ComponentId, Error, Result};

/// An electronic component tracked by the stock ledger.
///
/// `current_stock` is owned exclusively by the ledger operations; everything
/// else is ordinary master data keyed by the stable `part_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub part_number: String,
    pub current_stock: i64,
    pub monthly_required_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComponent {
    pub name: String,
    pub part_number: String,
    #[serde(default)]
    pub current_stock: i64,
    #[serde(default)]
    pub monthly_required_quantity: i64,
}

impl NewComponent {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name cannot be empty"));
        }
        if self.part_number.trim().is_empty() {
            return Err(Error::validation("part_number cannot be empty"));
        }
        if self.current_stock < 0 {
            return Err(Error::validation("current_stock cannot be negative"));
        }
        if self.monthly_required_quantity < 0 {
            return Err(Error::validation(
                "monthly_required_quantity cannot be negative",
            ));
        }
        Ok(())
    }

    /// Materialize the component with a fresh id and timestamps.
    pub fn into_component(self, now: DateTime<Utc>) -> Result<Component> {
        self.validate()?;
        Ok(Component {
            id: ComponentId::new(),
            name: self.name,
            part_number: self.part_number,
            current_stock: self.current_stock,
            monthly_required_quantity: self.monthly_required_quantity,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update for a component. Every field is optional and validated
/// individually; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPatch {
    pub name: Option<String>,
    pub part_number: Option<String>,
    pub current_stock: Option<i64>,
    pub monthly_required_quantity: Option<i64>,
}

impl ComponentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.part_number.is_none()
            && self.current_stock.is_none()
            && self.monthly_required_quantity.is_none()
    }

    /// Whether applying this patch can change the component's reorder
    /// standing (and therefore warrants a trigger check).
    pub fn affects_reorder_standing(&self) -> bool {
        self.current_stock.is_some() || self.monthly_required_quantity.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::validation("name cannot be empty"));
            }
        }
        if let Some(part_number) = &self.part_number {
            if part_number.trim().is_empty() {
                return Err(Error::validation("part_number cannot be empty"));
            }
        }
        if let Some(stock) = self.current_stock {
            if stock < 0 {
                return Err(Error::validation("current_stock cannot be negative"));
            }
        }
        if let Some(monthly) = self.monthly_required_quantity {
            if monthly < 0 {
                return Err(Error::validation(
                    "monthly_required_quantity cannot be negative",
                ));
            }
        }
        Ok(())
    }

    /// Apply the patch to a component, stamping `updated_at`.
    pub fn apply(&self, component: &mut Component, now: DateTime<Utc>) -> Result<()> {
        self.validate()?;
        if let Some(name) = &self.name {
            component.name = name.clone();
        }
        if let Some(part_number) = &self.part_number {
            component.part_number = part_number.clone();
        }
        if let Some(stock) = self.current_stock {
            component.current_stock = stock;
        }
        if let Some(monthly) = self.monthly_required_quantity {
            component.monthly_required_quantity = monthly;
        }
        component.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_component() -> NewComponent {
        NewComponent {
            name: "10k resistor".to_string(),
            part_number: "RES-10K-0402".to_string(),
            current_stock: 500,
            monthly_required_quantity: 200,
        }
    }

    #[test]
    fn create_validates_and_stamps_timestamps() {
        let now = Utc::now();
        let comp = new_component().into_component(now).unwrap();
        assert_eq!(comp.part_number, "RES-10K-0402");
        assert_eq!(comp.created_at, now);
        assert_eq!(comp.updated_at, now);
    }

    #[test]
    fn create_rejects_empty_part_number() {
        let mut input = new_component();
        input.part_number = "  ".to_string();
        assert!(matches!(
            input.into_component(Utc::now()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn create_rejects_negative_stock() {
        let mut input = new_component();
        input.current_stock = -1;
        assert!(matches!(input.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let created = Utc::now();
        let mut comp = new_component().into_component(created).unwrap();
        let patch = ComponentPatch {
            current_stock: Some(42),
            ..Default::default()
        };
        let later = Utc::now();
        patch.apply(&mut comp, later).unwrap();
        assert_eq!(comp.current_stock, 42);
        assert_eq!(comp.name, "10k resistor");
        assert_eq!(comp.updated_at, later);
    }

    #[test]
    fn patch_rejects_invalid_fields_without_mutating() {
        let mut comp = new_component().into_component(Utc::now()).unwrap();
        let patch = ComponentPatch {
            name: Some(String::new()),
            current_stock: Some(7),
            ..Default::default()
        };
        assert!(patch.apply(&mut comp, Utc::now()).is_err());
        assert_eq!(comp.current_stock, 500);
    }

    #[test]
    fn stock_and_demand_patches_warrant_trigger_checks() {
        let patch = ComponentPatch {
            monthly_required_quantity: Some(10),
            ..Default::default()
        };
        assert!(patch.affects_reorder_standing());

        let rename = ComponentPatch {
            name: Some("renamed".to_string()),
            ..Default::default()
        };
        assert!(!rename.affects_reorder_standing());
    }
}
