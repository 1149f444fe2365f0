use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use boardstock_api::app::{build_app, services::AppServices};
use boardstock_api::middleware::ACTOR_HEADER;
use boardstock_core::UserId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory backend, ephemeral port.
        let app = build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Api {
    client: reqwest::Client,
    base_url: String,
    actor: String,
}

impl Api {
    fn new(server: &TestServer) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: server.base_url.clone(),
            actor: UserId::new().to_string(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header(ACTOR_HEADER, &self.actor)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .header(ACTOR_HEADER, &self.actor)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header(ACTOR_HEADER, &self.actor)
            .send()
            .await
            .unwrap()
    }

    async fn create_component(&self, name: &str, part_number: &str, stock: i64, monthly: i64) -> Value {
        let response = self
            .post(
                "/api/components",
                json!({
                    "name": name,
                    "part_number": part_number,
                    "current_stock": stock,
                    "monthly_required_quantity": monthly,
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn create_pcb_with_bom(&self, code: &str, lines: Value) -> Value {
        let response = self
            .post("/api/pcbs", json!({ "name": format!("board {code}"), "code": code }))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let pcb: Value = response.json().await.unwrap();

        let response = self
            .put(
                &format!("/api/pcbs/{}/bom", pcb["id"].as_str().unwrap()),
                json!({ "lines": lines }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        pcb
    }
}

#[tokio::test]
async fn health_needs_no_actor() {
    let server = TestServer::spawn().await;
    let response = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn domain_routes_require_an_actor_identity() {
    let server = TestServer::spawn().await;
    let response = reqwest::Client::new()
        .get(format!("{}/api/components", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing_actor");
}

#[tokio::test]
async fn production_happy_path_deducts_and_records() {
    let server = TestServer::spawn().await;
    let api = Api::new(&server);

    let resistor = api.create_component("resistor", "RES-1", 500, 0).await;
    let cap = api.create_component("cap", "CAP-1", 300, 0).await;
    let pcb = api
        .create_pcb_with_bom(
            "CTRL-01",
            json!([
                { "component_id": resistor["id"], "quantity_per_unit": 4 },
                { "component_id": cap["id"], "quantity_per_unit": 2 },
            ]),
        )
        .await;

    let response = api
        .post(
            "/api/production",
            json!({ "pcb_id": pcb["id"], "quantity_produced": 10 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();

    let entry_id = body["production_entry"]["id"].as_str().unwrap().to_string();
    let consumption = body["consumption"].as_array().unwrap();
    assert_eq!(consumption.len(), 2);
    for record in consumption {
        let before = record["stock_before"].as_i64().unwrap();
        let after = record["stock_after"].as_i64().unwrap();
        let consumed = record["quantity_consumed"].as_i64().unwrap();
        assert_eq!(after, before - consumed);
    }

    let component: Value = api
        .get(&format!("/api/components/{}", resistor["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(component["current_stock"], 460);

    let history: Value = api.get("/api/production/history").await.json().await.unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["pcb_code"], "CTRL-01");

    let detail: Value = api
        .get(&format!("/api/production/{entry_id}/consumption"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn shortfall_then_substitution_retry() {
    let server = TestServer::spawn().await;
    let api = Api::new(&server);

    let y = api.create_component("Y", "Y-1", 2, 0).await;
    let z = api.create_component("Z", "Z-1", 20, 0).await;
    let pcb = api
        .create_pcb_with_bom(
            "D-01",
            json!([{
                "component_id": y["id"],
                "quantity_per_unit": 10,
                "alternative_component_id": z["id"],
            }]),
        )
        .await;

    // Without substitution: structured rejection carrying the alternative.
    let response = api
        .post(
            "/api/production",
            json!({ "pcb_id": pcb["id"], "quantity_produced": 1 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    let shortfall = &body["shortfalls"][0];
    assert_eq!(shortfall["current_stock"], 2);
    assert_eq!(shortfall["required"], 10);
    assert_eq!(shortfall["shortfall"], 8);
    assert_eq!(shortfall["alternative"]["component_id"], z["id"]);

    // Retry with the substitution toggled for the primary.
    let response = api
        .post(
            "/api/production",
            json!({
                "pcb_id": pcb["id"],
                "quantity_produced": 1,
                "substitutions": { y["id"].as_str().unwrap(): true },
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let y_after: Value = api
        .get(&format!("/api/components/{}", y["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    let z_after: Value = api
        .get(&format!("/api/components/{}", z["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(y_after["current_stock"], 2);
    assert_eq!(z_after["current_stock"], 10);
}

#[tokio::test]
async fn trigger_lifecycle_over_http() {
    let server = TestServer::spawn().await;
    let api = Api::new(&server);

    // stock 100, monthly 100 → threshold 20; producing 90 leaves 10.
    let x = api.create_component("X", "X-1", 100, 100).await;
    let pcb = api
        .create_pcb_with_bom(
            "A-01",
            json!([{ "component_id": x["id"], "quantity_per_unit": 90 }]),
        )
        .await;

    let response = api
        .post(
            "/api/production",
            json!({ "pcb_id": pcb["id"], "quantity_produced": 1 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let triggers: Value = api.get("/api/procurement").await.json().await.unwrap();
    let triggers = triggers.as_array().unwrap();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0]["status"], "PENDING");
    assert_eq!(triggers[0]["stock_at_trigger"], 10);
    assert_eq!(triggers[0]["threshold"], 20);
    assert_eq!(triggers[0]["part_number"], "X-1");
    let trigger_id = triggers[0]["id"].as_str().unwrap().to_string();

    // Resolve against a received PO.
    let response = api
        .put(
            &format!("/api/procurement/{trigger_id}/resolve"),
            json!({ "quantity_received": 50, "po_reference": "PO-1" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let resolved: Value = response.json().await.unwrap();
    assert_eq!(resolved["status"], "RESOLVED");
    assert_eq!(resolved["stock_at_resolution"], 10);
    assert_eq!(resolved["po_reference"], "PO-1");

    let x_after: Value = api
        .get(&format!("/api/components/{}", x["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(x_after["current_stock"], 60);
    assert_eq!(x_after["is_low_stock"], false);

    // Resolution is one-way.
    let response = api
        .put(
            &format!("/api/procurement/{trigger_id}/resolve"),
            json!({ "quantity_received": 50, "po_reference": "PO-2" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_and_conflict_responses() {
    let server = TestServer::spawn().await;
    let api = Api::new(&server);

    let c = api.create_component("dup", "DUP-1", 10, 0).await;

    // Duplicate part number.
    let response = api
        .post(
            "/api/components",
            json!({ "name": "dup again", "part_number": "DUP-1" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Non-positive production quantity.
    let pcb = api
        .create_pcb_with_bom(
            "V-01",
            json!([{ "component_id": c["id"], "quantity_per_unit": 1 }]),
        )
        .await;
    let response = api
        .post(
            "/api/production",
            json!({ "pcb_id": pcb["id"], "quantity_produced": 0 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown PCB.
    let response = api
        .post(
            "/api/production",
            json!({ "pcb_id": UserId::new().to_string(), "quantity_produced": 1 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn low_stock_filter_reports_reorder_standing() {
    let server = TestServer::spawn().await;
    let api = Api::new(&server);

    api.create_component("healthy", "H-1", 100, 100).await;
    api.create_component("starved", "S-1", 5, 100).await;

    let all: Value = api.get("/api/components").await.json().await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);

    let low: Value = api
        .get("/api/components?low_stock=true")
        .await
        .json()
        .await
        .unwrap();
    let low = low.as_array().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["part_number"], "S-1");
    assert_eq!(low[0]["is_low_stock"], true);

    // Creating a component below threshold opened a trigger immediately.
    let triggers: Value = api.get("/api/procurement").await.json().await.unwrap();
    assert_eq!(triggers.as_array().unwrap().len(), 1);
}
