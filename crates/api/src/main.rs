use std::sync::Arc;

#[tokio::main]
async fn main() {
    boardstock_observability::init();

    let services = boardstock_api::app::services::AppServices::from_env()
        .await
        .expect("failed to initialize storage");

    let app = boardstock_api::app::build_app(Arc::new(services));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
