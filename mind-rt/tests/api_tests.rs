//! Integration tests for the mind-rt HTTP control surface
//!
//! Tests cover:
//! - Health and profile listing
//! - Node creation, validation errors and conflicts
//! - Gate wiring and cycle rejection
//! - End to end: created node generates, connected gate resolves

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{FakeThoughtService, Harness};
use mind_common::config::TomlConfig;
use mind_rt::api::{build_router, AppContext};
use mind_rt::graph::GraphSettings;
use mind_rt::profiles::ProfileCatalog;
use mind_rt::Graph;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: graph over fakes, with short debounce windows
fn setup_app() -> (Router, Harness, Arc<FakeThoughtService>) {
    let harness = Harness::new();
    let service = FakeThoughtService::new();
    let config = TomlConfig {
        generate_debounce_ms: 50,
        resolve_debounce_ms: 30,
        ..TomlConfig::default()
    };
    let catalog = ProfileCatalog::new(vec![
        mind_common::api::Profile::new("wide_acoustic"),
        mind_common::api::Profile::new("dark_pulse_synth"),
    ]);
    let graph = Graph::new(
        service.clone(),
        Arc::clone(&harness.store),
        Arc::clone(&harness.scheduler),
        catalog,
        GraphSettings::from_config(&config),
    );
    let app = build_router(AppContext {
        graph,
        store: Arc::clone(&harness.store),
        scheduler: Arc::clone(&harness.scheduler),
    });
    (app, harness, service)
}

/// Test helper: request without a body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: request with a JSON body
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

// =============================================================================
// Health & Profiles
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _harness, _service) = setup_app();

    let (status, body) = send(&app, test_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "mind-rt");
    assert!(body["version"].is_string());
    assert_eq!(body["nodes"], 0);
}

#[tokio::test]
async fn test_list_profiles() {
    let (app, _harness, _service) = setup_app();

    let (status, body) = send(&app, test_request("GET", "/profiles")).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["profiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["wide_acoustic", "dark_pulse_synth"]);
}

#[tokio::test]
async fn test_event_stream_is_sse() {
    let (app, _harness, _service) = setup_app();

    let response = app.oneshot(test_request("GET", "/events")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
}

// =============================================================================
// Node creation
// =============================================================================

#[tokio::test]
async fn test_create_thought_node_with_defaults() {
    let (app, _harness, _service) = setup_app();

    let (status, body) = send(
        &app,
        json_request("POST", "/nodes/thought", json!({ "node_id": "node_1" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["node_id"], "node_1");
    assert_eq!(body["kind"], "thought");
    assert_eq!(body["intent_text"], "[0 7 12]");
    assert_eq!(body["style_profile"], "wide_acoustic");
    assert_eq!(body["status"], "idle");
    assert!(body["output"].is_null());
    assert!(body.get("inputs").is_none());
}

#[tokio::test]
async fn test_generated_ids_are_unique() {
    let (app, _harness, _service) = setup_app();

    let (_, first) = send(&app, json_request("POST", "/nodes/thought", json!({}))).await;
    let (_, second) = send(&app, json_request("POST", "/nodes/thought", json!({}))).await;

    let first = first["node_id"].as_str().unwrap();
    assert!(first.starts_with("node_"));
    assert_ne!(first, second["node_id"].as_str().unwrap());
}

#[tokio::test]
async fn test_duplicate_node_id_conflicts() {
    let (app, _harness, _service) = setup_app();
    let create = || json_request("POST", "/nodes/gate", json!({ "node_id": "gate_1" }));

    let (status, _) = send(&app, create()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, create()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_unknown_profile_rejected() {
    let (app, _harness, _service) = setup_app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/nodes/thought",
            json!({ "style_profile": "baroque_kazoo" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_gate_with_zero_inputs_rejected() {
    let (app, _harness, _service) = setup_app();

    let (status, _) = send(
        &app,
        json_request("POST", "/nodes/gate", json!({ "inputs": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_node_not_found() {
    let (app, _harness, _service) = setup_app();

    let (status, body) = send(&app, test_request("GET", "/nodes/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_intent_text_on_gate_rejected() {
    let (app, _harness, _service) = setup_app();
    send(
        &app,
        json_request("POST", "/nodes/gate", json!({ "node_id": "gate_1" })),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request("PATCH", "/nodes/gate_1", json!({ "intent_text": "[0]" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Wiring
// =============================================================================

#[tokio::test]
async fn test_connect_and_disconnect_input() {
    let (app, _harness, _service) = setup_app();
    send(
        &app,
        json_request("POST", "/nodes/thought", json!({ "node_id": "node_1" })),
    )
    .await;
    send(
        &app,
        json_request("POST", "/nodes/gate", json!({ "node_id": "gate_1" })),
    )
    .await;

    let (status, body) = send(
        &app,
        json_request("PUT", "/nodes/gate_1/inputs/1", json!({ "source": "node_1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inputs"], json!([null, "node_1"]));

    let (status, body) = send(&app, test_request("DELETE", "/nodes/gate_1/inputs/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inputs"], json!([null, null]));
}

#[tokio::test]
async fn test_connect_rejects_bad_slot_and_source() {
    let (app, _harness, _service) = setup_app();
    send(
        &app,
        json_request("POST", "/nodes/gate", json!({ "node_id": "gate_1" })),
    )
    .await;

    let (status, _) = send(
        &app,
        json_request("PUT", "/nodes/gate_1/inputs/5", json!({ "source": "gate_1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("PUT", "/nodes/gate_1/inputs/0", json!({ "source": "ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connect_rejects_cycles() {
    let (app, _harness, _service) = setup_app();
    for id in ["gate_a", "gate_b"] {
        send(
            &app,
            json_request("POST", "/nodes/gate", json!({ "node_id": id })),
        )
        .await;
    }

    let (status, _) = send(
        &app,
        json_request("PUT", "/nodes/gate_b/inputs/0", json!({ "source": "gate_a" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        json_request("PUT", "/nodes/gate_a/inputs/0", json!({ "source": "gate_b" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("cycle"));
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_thought_generates_and_gate_resolves() {
    let (app, harness, service) = setup_app();
    send(
        &app,
        json_request(
            "POST",
            "/nodes/thought",
            json!({ "node_id": "node_1", "intent_text": "[0 3 7]" }),
        ),
    )
    .await;
    send(
        &app,
        json_request("POST", "/nodes/gate", json!({ "node_id": "gate_1" })),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(100)).await;

    let (_, node) = send(&app, test_request("GET", "/nodes/node_1")).await;
    assert_eq!(node["status"], "scheduled");
    assert_eq!(node["output"]["node_id"], "node_1");
    assert_eq!(node["audio"]["has_pending_swap"], true);
    assert_eq!(service.generate_requests()[0].intent_text, "[0 3 7]");

    harness.transport.advance_to(0.0);
    let (_, node) = send(&app, test_request("GET", "/nodes/node_1")).await;
    assert_eq!(node["status"], "active");
    assert_eq!(node["audio"]["has_active_part"], true);

    send(
        &app,
        json_request("PUT", "/nodes/gate_1/inputs/0", json!({ "source": "node_1" })),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let requests = service.resolve_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].inputs[0].node_id, "node_1");

    let (_, gate) = send(&app, test_request("GET", "/nodes/gate_1")).await;
    assert_eq!(gate["output"]["node_id"], "node_1");
    assert_eq!(gate["status"], "idle");
    assert!(gate["audio"].is_null());
}

#[tokio::test(start_paused = true)]
async fn test_new_upstream_output_re_resolves_gate() {
    let (app, _harness, service) = setup_app();
    send(
        &app,
        json_request("POST", "/nodes/thought", json!({ "node_id": "node_1" })),
    )
    .await;
    send(
        &app,
        json_request("POST", "/nodes/gate", json!({ "node_id": "gate_1" })),
    )
    .await;
    send(
        &app,
        json_request("PUT", "/nodes/gate_1/inputs/0", json!({ "source": "node_1" })),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let before = service.resolve_requests().len();

    send(
        &app,
        json_request("PATCH", "/nodes/node_1", json!({ "intent_text": "[0 5]" })),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(service.generate_requests().len(), 2);
    assert_eq!(service.resolve_requests().len(), before + 1);
}
