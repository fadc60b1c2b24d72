//! Request Log Shipper - Binary Entry Point
//!
//! Serves a small HTTP API with request capture enabled, buffering request
//! logs under `SHIPPER_LOCAL_PATH` and shipping them into a dated JSONL
//! archive under `SHIPPER_ARCHIVE_PATH`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use request_log_shipper::capture::with_capture;
use request_log_shipper::{ArchiveSink, Shipper, ShipperConfig, StrictFields};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ShipperConfig::from_env().context("Invalid shipper configuration")?;
    let archive_path = env::var("SHIPPER_ARCHIVE_PATH").unwrap_or_else(|_| "archive".to_string());
    let bind: SocketAddr = env::var("SHIPPER_BIND")
        .unwrap_or_else(|_| "127.0.0.1:3030".to_string())
        .parse()
        .context("Invalid SHIPPER_BIND address")?;

    let shipper = Shipper::builder(config)
        .sink(Arc::new(ArchiveSink::new(&archive_path)))
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
                .strip_prefix("/api/items/")
                .filter(|id| !id.is_empty())
                .map(|id| format!("item:{}", id))
        })
        .strict(StrictFields::new())
        .build()?;

    let timer = shipper.start();

    let api = Router::new()
        .route("/api/items/:id", get(get_item).put(put_item))
        .route("/api/echo", post(echo));
    let app = with_capture(api, shipper.clone()).route("/health", get(health_check));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(%bind, buffer = %shipper.store().dir().display(), archive = %archive_path, "Log shipper listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    timer.shutdown().await;
    info!("Log shipper stopped");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    let level = env::var("SHIPPER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C signal");
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn get_item(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "id": id }))
}

async fn put_item(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "id": id, "item": body }))
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}
