//! Remote sinks
//!
//! A sink accepts one record at a time and resolves once the record is
//! durably stored. The upload pipeline awaits every push before reading the
//! next buffered line.
//!
//! Delivery is at-least-once: a drain that fails partway through a buffer
//! file re-sends that file's earlier records on the next attempt. Sinks that
//! cannot tolerate duplicates must de-duplicate on their side.

mod archive;
mod memory;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::types::EventRecord;

pub use archive::ArchiveSink;
pub use memory::MemorySink;

/// Durable destination for buffered records
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Store one record. Timeouts are the sink's own responsibility.
    async fn push(&self, record: EventRecord) -> Result<(), DeliveryError>;
}
