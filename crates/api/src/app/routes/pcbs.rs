use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use boardstock_catalog::{NewPcb, PcbPatch};
use boardstock_core::PcbId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(remove))
        .route("/:id/bom", get(get_bom).put(set_bom))
}

pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.store().list_pcbs().await {
        Ok(pcbs) => (StatusCode::OK, Json(pcbs)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewPcb>,
) -> axum::response::Response {
    let pcb = match body.into_pcb(Utc::now()) {
        Ok(pcb) => pcb,
        Err(err) => return errors::error_to_response(err),
    };

    match services.store().insert_pcb(pcb).await {
        Ok(pcb) => (StatusCode::CREATED, Json(pcb)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PcbId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid pcb id"),
    };

    match services.store().get_pcb(id).await {
        Ok(Some(pcb)) => (StatusCode::OK, Json(pcb)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "pcb not found"),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(patch): Json<PcbPatch>,
) -> axum::response::Response {
    let id: PcbId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid pcb id"),
    };

    match services.store().update_pcb(id, patch).await {
        Ok(pcb) => (StatusCode::OK, Json(pcb)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn remove(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PcbId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid pcb id"),
    };

    match services.store().delete_pcb(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "pcb deleted" })),
        )
            .into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn get_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PcbId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid pcb id"),
    };

    match services.store().bom_lines_for_pcb(id).await {
        Ok(lines) => (StatusCode::OK, Json(lines)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}

/// Replace the PCB's component mapping in one shot.
pub async fn set_bom(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetBomRequest>,
) -> axum::response::Response {
    let id: PcbId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid pcb id"),
    };

    match services.store().replace_bom_lines(id, body.lines).await {
        Ok(lines) => (StatusCode::OK, Json(lines)).into_response(),
        Err(err) => errors::error_to_response(err),
    }
}
