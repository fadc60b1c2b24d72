//! Capture Middleware Integration Tests
//!
//! Drives an axum router wrapped with `with_capture` and checks what lands in
//! the buffer directory.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::Path;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_stream::StreamExt;
use tower::ServiceExt;

use request_log_shipper::capture::with_capture;
use request_log_shipper::{EventRecord, MemorySink, RecordStatus, Shipper, ShipperConfig, StrictFields};

fn shipper(dir: &std::path::Path, strict: StrictFields) -> Arc<Shipper> {
    let config = ShipperConfig::new(dir)
        .with_files_limit(100)
        .with_file_size_limit_kb(10 * 1024)
        .with_file_expire_time(3600);

    Shipper::builder(config)
        .sink(Arc::new(MemorySink::new()))
        .filter(|parts| parts.uri.path() != "/health")
        .identity_resolver(|parts| {
            parts
                .headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .resource_resolver(|parts| {
            parts
                .uri
                .path()
                .strip_prefix("/items/")
                .map(|id| format!("item:{}", id))
        })
        .strict(strict)
        .build()
        .expect("Failed to build shipper")
}

fn app(shipper: Arc<Shipper>) -> Router {
    let routes = Router::new()
        .route("/items/:id", get(|Path(id): Path<String>| async move {
            Json(json!({"id": id}))
        }))
        .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
        .route("/broken", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
        .route("/health", get(|| async { "OK" }))
        .route("/stream", get(|| async {
            let first = tokio_stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from("{\"n\":1}\n"))]);
            let body = Body::from_stream(first.chain(tokio_stream::pending()));
            ([("content-type", "application/x-ndjson")], body)
        }));
    with_capture(routes, shipper)
}

async fn buffered(shipper: &Shipper) -> Vec<EventRecord> {
    let store = shipper.store();
    let mut records = Vec::new();
    for name in store.list_files().await.unwrap() {
        let mut lines = store.read_lines(&name).await.unwrap();
        while let Some(line) = lines.next_line().await.unwrap() {
            records.push(EventRecord::from_json_line(&line).unwrap());
        }
    }
    records
}

/// Buffering runs on a spawned task; poll until `count` records show up
async fn wait_for(shipper: &Shipper, count: usize) -> Vec<EventRecord> {
    for _ in 0..50 {
        let records = buffered(shipper).await;
        if records.len() >= count {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    buffered(shipper).await
}

#[tokio::test]
async fn test_request_is_buffered_with_resolved_fields() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new());
    let app = app(shipper.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/items/42")
                .header("x-user-id", "u-7")
                .header("x-forwarded-for", "203.0.113.9")
                .header("user-agent", "capture-test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"id": "42"}));

    let records = wait_for(&shipper, 1).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.user.as_deref(), Some("u-7"));
    assert_eq!(record.resource.as_deref(), Some("item:42"));
    assert_eq!(record.action, "GET");
    assert_eq!(record.ip, "203.0.113.9");
    assert_eq!(record.status, RecordStatus::Success);
    assert_eq!(record.request.user_agent.as_deref(), Some("capture-test"));
    assert_eq!(record.response.status_code, 200);
    assert_eq!(record.response.body, json!({"id": "42"}));
}

#[tokio::test]
async fn test_request_body_passes_through_and_is_recorded() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new());

    let response = app(shipper.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"greeting":"hi"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"greeting": "hi"}));

    let records = wait_for(&shipper, 1).await;
    assert_eq!(records[0].request.body, json!({"greeting": "hi"}));
    assert_eq!(records[0].ip, "unknown");
}

#[tokio::test]
async fn test_oversized_body_recorded_as_empty_object() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new());
    let big = "x".repeat(4096);

    app(shipper.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header("content-type", "application/json")
                .body(Body::from(json!({"blob": big}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let records = wait_for(&shipper, 1).await;
    assert_eq!(records[0].request.body, json!({}));
    assert_eq!(records[0].response.body, json!({}));
}

#[tokio::test]
async fn test_error_status_marks_failure() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new());

    let response = app(shipper.clone())
        .oneshot(Request::builder().uri("/broken").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let records = wait_for(&shipper, 1).await;
    assert_eq!(records[0].status, RecordStatus::Failure);
    assert_eq!(records[0].response.status_code, 500);
    assert_eq!(records[0].response.body, json!("boom"));
}

#[tokio::test]
async fn test_filtered_request_is_not_buffered() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new());
    let app = app(shipper.clone());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.oneshot(Request::builder().uri("/items/1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let records = wait_for(&shipper, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let records_after = buffered(&shipper).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records_after.len(), 1);
    assert_eq!(records_after[0].request.url, "/items/1");
}

#[tokio::test]
async fn test_strict_resource_drops_unresolved_request() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new().require("resource"));
    let app = app(shipper.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.oneshot(Request::builder().uri("/items/9").body(Body::empty()).unwrap())
        .await
        .unwrap();

    wait_for(&shipper, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let records = buffered(&shipper).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource.as_deref(), Some("item:9"));
}

#[tokio::test]
async fn test_streaming_response_is_not_held_back() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new());

    let response = timeout(
        Duration::from_secs(2),
        app(shipper.clone()).oneshot(Request::builder().uri("/stream").body(Body::empty()).unwrap()),
    )
    .await
    .expect("response headers should arrive while the body is still streaming")
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records = wait_for(&shipper, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request.url, "/stream");
    assert_eq!(records[0].response.body, json!({}));
}

#[tokio::test]
async fn test_streaming_request_body_is_not_read() {
    let temp_dir = TempDir::new().unwrap();
    let shipper = shipper(temp_dir.path(), StrictFields::new());
    let endless = tokio_stream::pending::<Result<Bytes, std::io::Error>>();

    let response = timeout(
        Duration::from_secs(2),
        app(shipper.clone()).oneshot(
            Request::builder()
                .uri("/items/5")
                .body(Body::from_stream(endless))
                .unwrap(),
        ),
    )
    .await
    .expect("handler should run without the request body being drained")
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records = wait_for(&shipper, 1).await;
    assert_eq!(records[0].request.body, json!({}));
    assert_eq!(records[0].response.body, json!({"id": "5"}));
}
