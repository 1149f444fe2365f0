use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use boardstock_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

/// Header carrying the acting user's id (a UUID).
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Require an actor identity on every domain route.
pub async fn actor_middleware(mut req: Request, next: Next) -> Response {
    let actor = req
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<UserId>().ok());

    match actor {
        Some(user_id) => {
            req.extensions_mut().insert(ActorContext::new(user_id));
            next.run(req).await
        }
        None => errors::json_error(
            StatusCode::UNAUTHORIZED,
            "missing_actor",
            format!("the {ACTOR_HEADER} header must carry a valid UUID"),
        ),
    }
}
