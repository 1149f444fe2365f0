use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use boardstock_core::ProductionEntryId;
use boardstock_production::ProductionRequest;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(produce))
        .route("/history", get(history))
        .route("/:id/consumption", get(consumption))
}

/// Submit a production request: atomically verify and deduct every required
/// component, or come back with the structured shortfall list.
pub async fn produce(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::ProduceRequest>,
) -> axum::response::Response {
    let request = ProductionRequest {
        pcb_id: body.pcb_id,
        quantity_produced: body.quantity_produced,
        substitutions: body.substitutions,
        produced_by: actor.user_id(),
    };

    match services.recorder().produce(request).await {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "production_entry": receipt.entry,
                "consumption": receipt.consumption,
            })),
        )
            .into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.store().production_history(100).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn consumption(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let entry_id: ProductionEntryId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid production entry id",
            );
        }
    };

    match services.store().get_production_entry(entry_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "entry not found");
        }
        Err(err) => return errors::error_to_response(err),
    }

    match services.store().consumption_for_entry(entry_id).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}
