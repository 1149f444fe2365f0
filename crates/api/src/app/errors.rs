use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use boardstock_core::Error;

/// Map an engine error onto a consistent JSON response.
///
/// `InsufficientStock` is the one business rejection that carries a
/// structured payload: the shortfall list is returned verbatim so the
/// client can re-submit with substitutions toggled.
pub fn error_to_response(err: Error) -> axum::response::Response {
    match err {
        Error::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        Error::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        Error::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        Error::InsufficientStock(shortfalls) => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": "insufficient stock for production",
                "shortfalls": shortfalls,
            })),
        )
            .into_response(),
        Error::Transaction(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "transaction_error",
                "internal storage failure",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
