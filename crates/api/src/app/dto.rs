use serde::Deserialize;
use serde_json::json;

use boardstock_bom::Substitutions;
use boardstock_catalog::Component;
use boardstock_core::PcbId;
use boardstock_procurement::needs_reorder;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ProduceRequest {
    pub pcb_id: PcbId,
    pub quantity_produced: i64,
    #[serde(default)]
    pub substitutions: Substitutions,
}

#[derive(Debug, Deserialize)]
pub struct ResolveTriggerRequest {
    pub quantity_received: i64,
    pub po_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct SetBomRequest {
    pub lines: Vec<boardstock_catalog::NewBomLine>,
}

#[derive(Debug, Deserialize)]
pub struct ComponentListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

// -------------------------
// Response mapping
// -------------------------

/// Components are always reported with their reorder standing.
pub fn component_to_json(component: &Component) -> serde_json::Value {
    let is_low_stock = needs_reorder(
        component.current_stock,
        component.monthly_required_quantity,
    );
    let mut value = json!(component);
    value["is_low_stock"] = json!(is_low_stock);
    value
}
