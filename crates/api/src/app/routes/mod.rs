use axum::Router;

pub mod components;
pub mod pcbs;
pub mod procurement;
pub mod production;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .nest("/api/components", components::router())
        .nest("/api/pcbs", pcbs::router())
        .nest("/api/production", production::router())
        .nest("/api/procurement", procurement::router())
}
