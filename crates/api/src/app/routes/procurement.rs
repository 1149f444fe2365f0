use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use boardstock_core::TriggerId;
use boardstock_procurement::TriggerResolution;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/:id/resolve", put(resolve))
}

/// All triggers, newest first, joined with component identity.
pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store().list_triggers().await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

/// Close a pending trigger against a received purchase order.
pub async fn resolve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ResolveTriggerRequest>,
) -> axum::response::Response {
    let trigger_id: TriggerId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid trigger id");
        }
    };

    let resolution = TriggerResolution {
        quantity_received: body.quantity_received,
        po_reference: body.po_reference,
    };

    match services.monitor().resolve(trigger_id, resolution).await {
        Ok(trigger) => (StatusCode::OK, Json(trigger)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}
