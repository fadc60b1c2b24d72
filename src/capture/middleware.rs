//! Axum middleware that captures request/response pairs

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes, HttpBody};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::engine::Shipper;
use crate::types::RecordStatus;

/// Wrap every route of `router` with request capture
pub fn with_capture<S>(router: Router<S>, shipper: Arc<Shipper>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(shipper, capture_requests))
}

/// Middleware: log the request, run the handler, log the response
///
/// Buffering happens on a spawned task; the response is returned without
/// waiting for the local append or any flush it triggers.
pub async fn capture_requests(
    State(shipper): State<Arc<Shipper>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    if !shipper.capture().should_capture(&parts) {
        return next.run(Request::from_parts(parts, body)).await;
    }

    let limit = shipper.capture().body_size_limit();
    let (body, request_body) = match capture_body(body, limit).await {
        Ok(captured) => captured,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "invalid request body").into_response();
        }
    };

    let pending = shipper
        .capture()
        .start(&parts, client_ip(&parts), request_body);

    let response = next.run(Request::from_parts(parts, body)).await;

    let status = response.status();
    let outcome = if status.is_client_error() || status.is_server_error() {
        RecordStatus::Failure
    } else {
        RecordStatus::Success
    };

    let (parts, body) = response.into_parts();
    let (body, response_body) = match capture_body(body, limit).await {
        Ok(captured) => captured,
        Err(e) => {
            warn!(error = %e, "Failed to read response body");
            (Body::empty(), json!({}))
        }
    };
    let response = Response::from_parts(parts, body);

    let record = pending.complete(outcome, status.as_u16(), response_body);
    if shipper.capture().admits(&record) {
        tokio::spawn(async move {
            shipper.on_event(record).await;
        });
    } else {
        debug!(url = %record.request.url, "Record missing a strict field, dropped");
    }

    response
}

/// Read a body for the record only when its exact size is known and within `limit`
///
/// Streamed, chunked and oversized bodies pass through untouched and are
/// recorded as `{}`, so a long-lived body never holds back the exchange.
async fn capture_body(body: Body, limit: usize) -> Result<(Body, Value), axum::Error> {
    match body.size_hint().exact() {
        Some(len) if len <= limit as u64 => {
            let bytes = to_bytes(body, limit).await?;
            let value = body_to_json(&bytes);
            Ok((Body::from(bytes), value))
        }
        _ => Ok((body, json!({}))),
    }
}

/// First `x-forwarded-for` hop, else the socket peer, else `"unknown"`
fn client_ip(parts: &Parts) -> String {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// JSON bodies are kept as JSON, anything else as a string, empty as `{}`
fn body_to_json(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return json!({});
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
