//! Event record types
//!
//! An `EventRecord` is the immutable unit written to buffer files: one JSON
//! object per line. Records start life as a `PendingRecord` when a request
//! arrives and are completed once the downstream handler has responded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default maximum serialized size of a captured body, in bytes
pub const DEFAULT_BODY_SIZE_LIMIT: usize = 2048;

/// Outcome of the logged request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum RecordStatus {
    /// Handler has not resolved yet
    #[default]
    Pending,
    /// Handler failed or answered with an error status
    Failure,
    /// Handler answered successfully
    Success,
}

impl From<RecordStatus> for i8 {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Pending => 0,
            RecordStatus::Failure => -1,
            RecordStatus::Success => 1,
        }
    }
}

impl TryFrom<i8> for RecordStatus {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RecordStatus::Pending),
            -1 => Ok(RecordStatus::Failure),
            1 => Ok(RecordStatus::Success),
            other => Err(format!("unknown record status {}", other)),
        }
    }
}

/// Snapshot of the incoming request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub url: String,
    pub method: String,
    #[serde(rename = "userAgent", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default = "empty_body")]
    pub body: Value,
}

/// Snapshot of the outgoing response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default = "empty_body")]
    pub body: Value,
}

fn empty_body() -> Value {
    json!({})
}

/// One logged request/response outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Subject identity (who performed the request)
    #[serde(default)]
    pub user: Option<String>,

    /// Resource the request acted upon
    #[serde(default)]
    pub resource: Option<String>,

    /// Operation kind, usually the HTTP method
    pub action: String,

    pub status: RecordStatus,

    /// Origin address of the caller
    pub ip: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    pub request: RequestSnapshot,

    pub response: ResponseSnapshot,
}

impl EventRecord {
    /// Serialize record to a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize record from a JSON line
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Check whether a serialized top-level field is present and non-null
    ///
    /// Field names use the serialized (camelCase) form, e.g. `resource`
    /// or `createdAt`.
    pub fn has_field(&self, field: &str) -> bool {
        match field {
            "user" => self.user.is_some(),
            "resource" => self.resource.is_some(),
            _ => serde_json::to_value(self)
                .ok()
                .and_then(|v| v.get(field).cloned())
                .is_some_and(|v| !v.is_null()),
        }
    }
}

/// A record under construction: the request has been seen, the response not yet
#[derive(Debug, Clone)]
pub struct PendingRecord {
    user: Option<String>,
    resource: Option<String>,
    action: String,
    ip: String,
    created_at: DateTime<Utc>,
    request: RequestSnapshot,
    body_size_limit: usize,
}

impl PendingRecord {
    /// Start a record at request time. The request body is truncated here.
    pub fn start(
        action: impl Into<String>,
        ip: impl Into<String>,
        mut request: RequestSnapshot,
        body_size_limit: usize,
    ) -> Self {
        request.body = truncate_body(request.body, body_size_limit);
        Self {
            user: None,
            resource: None,
            action: action.into(),
            ip: ip.into(),
            created_at: Utc::now(),
            request,
            body_size_limit,
        }
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn with_resource(mut self, resource: Option<String>) -> Self {
        self.resource = resource;
        self
    }

    /// Override the creation time (used when replaying or in tests)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Finish the record with the downstream outcome
    pub fn complete(self, status: RecordStatus, status_code: u16, body: Value) -> EventRecord {
        EventRecord {
            user: self.user,
            resource: self.resource,
            action: self.action,
            status,
            ip: self.ip,
            created_at: self.created_at,
            request: self.request,
            response: ResponseSnapshot {
                status_code,
                body: truncate_body(body, self.body_size_limit),
            },
        }
    }
}

/// Replace a body with `{}` when its serialized size exceeds `limit` bytes
pub fn truncate_body(body: Value, limit: usize) -> Value {
    let size = serde_json::to_vec(&body).map(|bytes| bytes.len());
    match size {
        Ok(size) if size <= limit => body,
        _ => empty_body(),
    }
}
