//! Request capture
//!
//! Decides which requests are logged and turns them into records:
//! - `CapturePolicy`: filter, identity/resource resolvers, strict fields
//! - `capture_requests`: axum middleware feeding records to a `Shipper`

mod middleware;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use serde_json::Value;

use crate::types::{EventRecord, PendingRecord, RequestSnapshot};

pub use middleware::{capture_requests, with_capture};

/// Decides whether a request is logged at all
pub type RequestFilter = Arc<dyn Fn(&Parts) -> bool + Send + Sync>;

/// Resolves an optional field (subject identity, resource id) from a request
pub type FieldResolver = Arc<dyn Fn(&Parts) -> Option<String> + Send + Sync>;

/// Fields a finished record must carry to be buffered
///
/// A record missing any field marked `true` is dropped silently.
#[derive(Debug, Clone, Default)]
pub struct StrictFields(HashMap<String, bool>);

impl StrictFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a field (serialized name, e.g. `resource`) as required
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), true);
        self
    }

    pub fn is_strict(&self, field: &str) -> bool {
        self.0.get(field).copied().unwrap_or(false)
    }

    /// Whether the record carries every strict field
    pub fn admits(&self, record: &EventRecord) -> bool {
        self.0
            .iter()
            .filter(|(_, strict)| **strict)
            .all(|(field, _)| record.has_field(field))
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for StrictFields {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Everything the middleware needs to turn a request into a record
#[derive(Clone)]
pub struct CapturePolicy {
    pub(crate) filter: RequestFilter,
    pub(crate) identity: FieldResolver,
    pub(crate) resource: FieldResolver,
    pub(crate) strict: StrictFields,
    pub(crate) body_size_limit: usize,
}

impl fmt::Debug for CapturePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturePolicy")
            .field("strict", &self.strict)
            .field("body_size_limit", &self.body_size_limit)
            .finish_non_exhaustive()
    }
}

impl CapturePolicy {
    pub fn should_capture(&self, parts: &Parts) -> bool {
        (self.filter)(parts)
    }

    /// Begin a record for an incoming request
    pub fn start(&self, parts: &Parts, ip: String, body: Value) -> PendingRecord {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let request = RequestSnapshot {
            url: parts.uri.to_string(),
            method: parts.method.to_string(),
            user_agent,
            body,
        };

        PendingRecord::start(parts.method.as_str(), ip, request, self.body_size_limit)
            .with_user((self.identity)(parts))
            .with_resource((self.resource)(parts))
    }

    pub fn admits(&self, record: &EventRecord) -> bool {
        self.strict.admits(record)
    }

    pub fn strict(&self) -> &StrictFields {
        &self.strict
    }

    /// Largest body, in bytes, read into a record
    pub fn body_size_limit(&self) -> usize {
        self.body_size_limit
    }
}
