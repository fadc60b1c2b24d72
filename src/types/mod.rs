//! Data types for the request log shipper
//!
//! This module contains the record model that flows from request capture,
//! through buffer files, to the remote sink.

mod record;

pub use record::{
    truncate_body, EventRecord, PendingRecord, RecordStatus, RequestSnapshot, ResponseSnapshot,
    DEFAULT_BODY_SIZE_LIMIT,
};
