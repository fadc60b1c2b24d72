//! In-memory sink with failure injection

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::RemoteSink;
use crate::error::DeliveryError;
use crate::types::EventRecord;

/// Sink that keeps delivered records in memory
///
/// Useful for tests and for embedding the shipper where records are consumed
/// in-process. Failures can be injected per attempt or for a whole outage.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
    attempts: AtomicUsize,
    fail_on_attempt: Mutex<Option<usize>>,
    offline: AtomicBool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every push
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make the `n`-th push attempt (1-based, counted since creation) fail once
    pub fn fail_on_attempt(&self, n: usize) {
        *self.fail_on_attempt.lock() = Some(n);
    }

    /// Reject every push while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Records stored so far, in delivery order
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Total push calls, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of pushes ever running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSink for MemorySink {
    async fn push(&self, record: EventRecord) -> Result<(), DeliveryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut fail_on = self.fail_on_attempt.lock();
            if self.offline.load(Ordering::SeqCst) {
                Err(DeliveryError::new("sink offline"))
            } else if *fail_on == Some(attempt) {
                *fail_on = None;
                Err(DeliveryError::new(format!("injected failure on attempt {}", attempt)))
            } else {
                self.records.lock().push(record);
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PendingRecord, RecordStatus, RequestSnapshot};
    use serde_json::json;

    fn record() -> EventRecord {
        PendingRecord::start(
            "DELETE",
            "127.0.0.1",
            RequestSnapshot {
                url: "/x".to_string(),
                method: "DELETE".to_string(),
                user_agent: None,
                body: json!({}),
            },
            2048,
        )
        .complete(RecordStatus::Success, 204, json!({}))
    }

    #[tokio::test]
    async fn test_fail_on_attempt_is_one_shot() {
        let sink = MemorySink::new();
        sink.fail_on_attempt(2);

        assert!(sink.push(record()).await.is_ok());
        assert!(sink.push(record()).await.is_err());
        assert!(sink.push(record()).await.is_ok());

        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_offline_rejects_until_restored() {
        let sink = MemorySink::new();
        sink.set_offline(true);
        assert!(sink.push(record()).await.is_err());
        assert!(sink.is_empty());

        sink.set_offline(false);
        assert!(sink.push(record()).await.is_ok());
        assert_eq!(sink.len(), 1);
    }
}
