use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use boardstock_core::{AlternativeSuggestion, ComponentId, Error, Result, Shortfall};

/// Point-in-time view of a component, as read under the ledger's row locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSnapshot {
    pub id: ComponentId,
    pub name: String,
    pub part_number: String,
    pub current_stock: i64,
}

/// One BOM line joined with the snapshots it may draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomRequirement {
    pub quantity_per_unit: i64,
    pub primary: ComponentSnapshot,
    pub alternative: Option<ComponentSnapshot>,
}

/// Caller-requested substitutions, keyed by the BOM line's primary
/// component id. A `true` entry means "draw from the approved alternative".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Substitutions(HashMap<ComponentId, bool>);

impl Substitutions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn prefer_alternative(mut self, primary: ComponentId) -> Self {
        self.0.insert(primary, true);
        self
    }

    pub fn prefers_alternative(&self, primary: ComponentId) -> bool {
        self.0.get(&primary).copied().unwrap_or(false)
    }
}

impl From<HashMap<ComponentId, bool>> for Substitutions {
    fn from(map: HashMap<ComponentId, bool>) -> Self {
        Self(map)
    }
}

/// A line the ledger can cover: deduct `quantity` from `component_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedConsumption {
    /// The resolved target — the alternative when substitution applied.
    pub component_id: ComponentId,
    pub quantity: i64,
    /// Target stock at resolution time; the deduction must observe the same
    /// value or the surrounding transaction is invalid.
    pub stock_before: i64,
}

/// Outcome of resolving a PCB's BOM against current stock: every line lands
/// either in `plan` or in `shortfalls`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub plan: Vec<PlannedConsumption>,
    pub shortfalls: Vec<Shortfall>,
}

impl Resolution {
    pub fn is_satisfied(&self) -> bool {
        self.shortfalls.is_empty()
    }

    /// The all-or-nothing gate: the full plan, or the full shortfall list.
    pub fn into_plan(self) -> Result<Vec<PlannedConsumption>> {
        if self.shortfalls.is_empty() {
            Ok(self.plan)
        } else {
            Err(Error::insufficient_stock(self.shortfalls))
        }
    }
}

/// Resolve the BOM lines of one production request.
///
/// For each line the required quantity is `quantity_per_unit × quantity`.
/// The target is the alternative iff the caller asked for it **and** one is
/// configured; asking for a substitution on a line without an alternative
/// falls back to the primary. A shortfall on a primary with a configured
/// alternative carries that alternative as a suggestion even when the
/// alternative could not cover the line either.
///
/// Lines are resolved in order against a running stock level per target, so
/// two lines drawing from the same component (possible through substitution)
/// see each other's consumption: the second line's `stock_before` is the
/// first line's remainder, and cumulative insufficiency is reported as a
/// shortfall rather than slipping past per-line checks.
///
/// Fails with `NotFound` when `lines` is empty (the PCB has no BOM) and with
/// a validation error when a required quantity overflows.
pub fn resolve_requirements(
    lines: &[BomRequirement],
    quantity: i64,
    substitutions: &Substitutions,
) -> Result<Resolution> {
    if lines.is_empty() {
        return Err(Error::not_found());
    }

    let mut resolution = Resolution::default();
    let mut remaining: HashMap<ComponentId, i64> = HashMap::new();

    for line in lines {
        let required = line
            .quantity_per_unit
            .checked_mul(quantity)
            .ok_or_else(|| Error::validation("required quantity overflows"))?;

        let substituted = substitutions.prefers_alternative(line.primary.id);
        let target = match (&line.alternative, substituted) {
            (Some(alternative), true) => alternative,
            _ => &line.primary,
        };

        let available = *remaining.entry(target.id).or_insert(target.current_stock);

        if available >= required {
            resolution.plan.push(PlannedConsumption {
                component_id: target.id,
                quantity: required,
                stock_before: available,
            });
            remaining.insert(target.id, available - required);
        } else {
            let suggestion = if target.id == line.primary.id {
                line.alternative.as_ref().map(|alt| AlternativeSuggestion {
                    component_id: alt.id,
                    component_name: alt.name.clone(),
                    part_number: alt.part_number.clone(),
                    current_stock: alt.current_stock,
                })
            } else {
                None
            };

            resolution.shortfalls.push(Shortfall {
                component_id: line.primary.id,
                component_name: line.primary.name.clone(),
                part_number: line.primary.part_number.clone(),
                current_stock: available,
                required,
                shortfall: required - available,
                alternative: suggestion,
            });
        }
    }

    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(name: &str, stock: i64) -> ComponentSnapshot {
        ComponentSnapshot {
            id: ComponentId::new(),
            name: name.to_string(),
            part_number: format!("PN-{name}"),
            current_stock: stock,
        }
    }

    fn requirement(qty_per_unit: i64, primary: ComponentSnapshot) -> BomRequirement {
        BomRequirement {
            quantity_per_unit: qty_per_unit,
            primary,
            alternative: None,
        }
    }

    #[test]
    fn empty_bom_is_not_found() {
        let result = resolve_requirements(&[], 1, &Substitutions::none());
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn sufficient_lines_become_plan_items() {
        let primary = snapshot("res", 100);
        let id = primary.id;
        let resolution =
            resolve_requirements(&[requirement(3, primary)], 10, &Substitutions::none()).unwrap();

        assert!(resolution.is_satisfied());
        assert_eq!(
            resolution.plan,
            vec![PlannedConsumption {
                component_id: id,
                quantity: 30,
                stock_before: 100,
            }]
        );
    }

    #[test]
    fn insufficient_line_reports_shortfall_arithmetic() {
        let primary = snapshot("cap", 10);
        let resolution =
            resolve_requirements(&[requirement(3, primary)], 5, &Substitutions::none()).unwrap();

        assert_eq!(resolution.plan, vec![]);
        let shortfall = &resolution.shortfalls[0];
        assert_eq!(shortfall.required, 15);
        assert_eq!(shortfall.current_stock, 10);
        assert_eq!(shortfall.shortfall, 5);
        assert!(shortfall.alternative.is_none());
    }

    #[test]
    fn shortfall_on_primary_suggests_configured_alternative() {
        let primary = snapshot("mcu", 2);
        let primary_id = primary.id;
        let alternative = snapshot("mcu-alt", 20);
        let alt_id = alternative.id;

        let line = BomRequirement {
            quantity_per_unit: 10,
            primary,
            alternative: Some(alternative),
        };

        let resolution = resolve_requirements(&[line], 1, &Substitutions::none()).unwrap();
        let shortfall = &resolution.shortfalls[0];
        assert_eq!(shortfall.component_id, primary_id);
        let suggestion = shortfall.alternative.as_ref().unwrap();
        assert_eq!(suggestion.component_id, alt_id);
        assert!(suggestion.covers(shortfall.required));
    }

    #[test]
    fn alternative_is_suggested_even_when_itself_insufficient() {
        let primary = snapshot("mcu", 2);
        let alternative = snapshot("mcu-alt", 3);

        let line = BomRequirement {
            quantity_per_unit: 10,
            primary,
            alternative: Some(alternative),
        };

        let resolution = resolve_requirements(&[line], 1, &Substitutions::none()).unwrap();
        let suggestion = resolution.shortfalls[0].alternative.as_ref().unwrap();
        assert!(!suggestion.covers(10));
    }

    #[test]
    fn substitution_draws_from_alternative_and_spares_primary() {
        let primary = snapshot("mcu", 2);
        let primary_id = primary.id;
        let alternative = snapshot("mcu-alt", 20);
        let alt_id = alternative.id;

        let line = BomRequirement {
            quantity_per_unit: 10,
            primary,
            alternative: Some(alternative),
        };
        let subs = Substitutions::none().prefer_alternative(primary_id);

        let resolution = resolve_requirements(&[line], 1, &subs).unwrap();
        assert!(resolution.is_satisfied());
        assert_eq!(resolution.plan[0].component_id, alt_id);
        assert_eq!(resolution.plan[0].quantity, 10);
        assert_eq!(resolution.plan[0].stock_before, 20);
    }

    #[test]
    fn substitution_without_configured_alternative_is_a_no_op() {
        let primary = snapshot("res", 100);
        let primary_id = primary.id;
        let subs = Substitutions::none().prefer_alternative(primary_id);

        let resolution = resolve_requirements(&[requirement(2, primary)], 10, &subs).unwrap();
        assert_eq!(resolution.plan[0].component_id, primary_id);
    }

    #[test]
    fn substituted_shortfall_reports_alternative_stock_without_suggestion() {
        let primary = snapshot("mcu", 2);
        let primary_id = primary.id;
        let alternative = snapshot("mcu-alt", 4);

        let line = BomRequirement {
            quantity_per_unit: 10,
            primary,
            alternative: Some(alternative),
        };
        let subs = Substitutions::none().prefer_alternative(primary_id);

        let resolution = resolve_requirements(&[line], 1, &subs).unwrap();
        let shortfall = &resolution.shortfalls[0];
        // Correlates by primary id, but reports the targeted alternative's stock.
        assert_eq!(shortfall.component_id, primary_id);
        assert_eq!(shortfall.current_stock, 4);
        assert_eq!(shortfall.shortfall, 6);
        assert!(shortfall.alternative.is_none());
    }

    #[test]
    fn lines_sharing_a_target_see_each_others_consumption() {
        // Two primaries both substituted onto the same alternative: the
        // second line draws from what the first one left.
        let shared = snapshot("shared-alt", 100);
        let shared_id = shared.id;
        let p1 = snapshot("p1", 0);
        let p1_id = p1.id;
        let p2 = snapshot("p2", 0);
        let p2_id = p2.id;

        let lines = vec![
            BomRequirement {
                quantity_per_unit: 60,
                primary: p1,
                alternative: Some(shared.clone()),
            },
            BomRequirement {
                quantity_per_unit: 30,
                primary: p2,
                alternative: Some(shared),
            },
        ];
        let subs = Substitutions::none()
            .prefer_alternative(p1_id)
            .prefer_alternative(p2_id);

        let resolution = resolve_requirements(&lines, 1, &subs).unwrap();
        assert!(resolution.is_satisfied());
        assert_eq!(resolution.plan[0].component_id, shared_id);
        assert_eq!(resolution.plan[0].stock_before, 100);
        assert_eq!(resolution.plan[1].component_id, shared_id);
        assert_eq!(resolution.plan[1].stock_before, 40);
    }

    #[test]
    fn cumulative_draw_on_a_shared_target_is_a_shortfall() {
        let shared = snapshot("shared-alt", 100);
        let p1 = snapshot("p1", 0);
        let p1_id = p1.id;
        let p2 = snapshot("p2", 0);
        let p2_id = p2.id;

        let lines = vec![
            BomRequirement {
                quantity_per_unit: 80,
                primary: p1,
                alternative: Some(shared.clone()),
            },
            BomRequirement {
                quantity_per_unit: 50,
                primary: p2,
                alternative: Some(shared),
            },
        ];
        let subs = Substitutions::none()
            .prefer_alternative(p1_id)
            .prefer_alternative(p2_id);

        let resolution = resolve_requirements(&lines, 1, &subs).unwrap();
        assert_eq!(resolution.plan.len(), 1);
        let shortfall = &resolution.shortfalls[0];
        assert_eq!(shortfall.component_id, p2_id);
        assert_eq!(shortfall.current_stock, 20);
        assert_eq!(shortfall.shortfall, 30);
    }

    #[test]
    fn into_plan_rejects_when_any_line_falls_short() {
        let good = requirement(1, snapshot("a", 50));
        let bad = requirement(100, snapshot("b", 1));

        let resolution =
            resolve_requirements(&[good, bad], 2, &Substitutions::none()).unwrap();
        match resolution.into_plan() {
            Err(Error::InsufficientStock(shortfalls)) => assert_eq!(shortfalls.len(), 1),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every line lands in exactly one partition, plan items
        /// never exceed available stock, and shortfall arithmetic is exact.
        #[test]
        fn resolution_partitions_lines_exactly(
            specs in prop::collection::vec((1i64..100, 0i64..10_000), 1..20),
            quantity in 1i64..50,
        ) {
            let lines: Vec<BomRequirement> = specs
                .iter()
                .enumerate()
                .map(|(i, (per_unit, stock))| requirement(*per_unit, snapshot(&format!("c{i}"), *stock)))
                .collect();

            let resolution = resolve_requirements(&lines, quantity, &Substitutions::none()).unwrap();
            prop_assert_eq!(resolution.plan.len() + resolution.shortfalls.len(), lines.len());

            for item in &resolution.plan {
                prop_assert!(item.stock_before >= item.quantity);
            }
            for shortfall in &resolution.shortfalls {
                prop_assert!(shortfall.shortfall > 0);
                prop_assert_eq!(shortfall.required - shortfall.current_stock, shortfall.shortfall);
            }
        }
    }
}
