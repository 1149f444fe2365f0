use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use boardstock_catalog::{ComponentPatch, NewComponent};
use boardstock_core::ComponentId;
use boardstock_infra::ComponentFilter;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(remove))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ComponentListQuery>,
) -> axum::response::Response {
    let filter = ComponentFilter {
        search: query.search,
        low_stock_only: query.low_stock,
    };
    match services.store().list_components(filter).await {
        Ok(components) => {
            let body: Vec<_> = components.iter().map(dto::component_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewComponent>,
) -> axum::response::Response {
    let component = match body.into_component(Utc::now()) {
        Ok(component) => component,
        Err(err) => return errors::error_to_response(err),
    };

    match services.store().insert_component(component).await {
        Ok(component) => {
            // A component can be born below its threshold; evaluate it right
            // away, best-effort.
            if let Err(err) = services.monitor().check_component(component.id).await {
                tracing::warn!(component_id = %component.id, error = %err, "trigger check failed");
            }
            (StatusCode::CREATED, Json(dto::component_to_json(&component))).into_response()
        }
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ComponentId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid component id");
        }
    };

    match services.store().get_component(id).await {
        Ok(Some(component)) => {
            (StatusCode::OK, Json(dto::component_to_json(&component))).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "component not found"),
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(patch): Json<ComponentPatch>,
) -> axum::response::Response {
    let id: ComponentId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid component id");
        }
    };

    let recheck = patch.affects_reorder_standing();
    match services.store().update_component(id, patch).await {
        Ok(component) => {
            if recheck {
                if let Err(err) = services.monitor().check_component(id).await {
                    tracing::warn!(component_id = %id, error = %err, "trigger check failed");
                }
            }
            (StatusCode::OK, Json(dto::component_to_json(&component))).into_response()
        }
        Err(err) => errors::error_to_response(err),
    }
}

pub async fn remove(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ComponentId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid component id");
        }
    };

    match services.store().delete_component(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "component deleted" })),
        )
            .into_response(),
        Err(err) => errors::error_to_response(err),
    }
}
