mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use http_body_util::BodyExt;
use mentorgraph::graph::MemoryGraph;
use mentorgraph::http::router;
use mentorgraph::QaService;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app(model: Arc<dyn mentorgraph::LanguageModel>) -> axum::Router {
    let service = QaService::start(Arc::new(MemoryGraph::new()), registry(model), &test_config())
        .await
        .unwrap();
    router(Arc::new(service))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_populate_answer_and_delete() {
    let app = app(Arc::new(ScriptedModel::mentorship())).await;

    let (status, body) = send(&app, get("/populate_data")).await;
    assert_eq!(status, StatusCode::OK);
    let schema = body["result"].as_str().unwrap();
    assert!(schema.contains("(:Person)-[:IS_TECH_MENTEE_OF]->(:Person)"));

    let (status, body) = send(
        &app,
        post("/generate_response", json!({"question": ADA_TECH_MENTOR, "model": "llama"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "The answer is Grace Hopper.");

    let (status, body) = send(&app, get("/delete_data")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["result"].as_str().unwrap().contains("Person"));

    let (_, body) = send(
        &app,
        post("/generate_response", json!({"question": ADA_TECH_MENTOR, "model": "llama"})),
    )
    .await;
    assert_eq!(body["response"], "I don't know the answer.");
}

#[tokio::test]
async fn test_rephrase_route() {
    let model = ScriptedModel::new().with_rephrasing("ada's project?", "Which projects does Ada Lovelace work on");
    let app = app(Arc::new(model)).await;

    let (status, body) = send(
        &app,
        post("/rephrase_prompt", json!({"question": "ada's project?", "model": "llama"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Which projects does Ada Lovelace work on?");
}

#[tokio::test]
async fn test_invalid_requests_are_400() {
    let app = app(Arc::new(ScriptedModel::mentorship())).await;

    for body in [
        json!({"question": "  ", "model": "llama"}),
        json!({"question": ADA_TECH_MENTOR, "model": "gpt-5"}),
        json!({"question": ADA_TECH_MENTOR}),
    ] {
        let (status, body) = send(&app, post("/generate_response", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_backend_failure_is_503_without_details() {
    let app = app(Arc::new(UnreachableModel)).await;
    send(&app, get("/populate_data")).await;

    let (status, body) = send(
        &app,
        post("/generate_response", json!({"question": ADA_TECH_MENTOR, "model": "llama"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_missing_seed_is_500() {
    let mut config = test_config();
    config.seed.source = "/nonexistent/employees.csv".to_string();
    let service = QaService::start(
        Arc::new(MemoryGraph::new()),
        registry(Arc::new(ScriptedModel::new())),
        &config,
    )
    .await
    .unwrap();
    let app = router(Arc::new(service));

    let (status, body) = send(&app, get("/populate_data")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("I/O error"));
}

#[tokio::test]
async fn test_status_route() {
    let app = app(Arc::new(ScriptedModel::mentorship())).await;
    send(&app, get("/populate_data")).await;

    let (status, body) = send(&app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], mentorgraph::VERSION);
    assert_eq!(body["models"], json!(["llama"]));
    assert_eq!(body["graph"]["labels"], json!(["Person", "Project"]));
    assert_eq!(body["graph"]["relationship_types"][4], "WORKS_ON");
}
