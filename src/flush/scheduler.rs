//! Scheduler - serializes flush attempts
//!
//! Events and timer ticks both funnel into one routine. A single owned flag
//! guarantees at most one drain runs at a time; a trigger that finds the
//! flag set returns immediately instead of queueing.

use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::pipeline::{DrainReport, UploadPipeline};
use super::policy::FlushPolicy;
use crate::buffer::{BufferStats, BufferStore};
use crate::types::EventRecord;

/// Result of one scheduler trigger
#[derive(Debug)]
pub enum FlushOutcome {
    /// Another trigger holds the flush flag, either checking thresholds or
    /// draining. The record (if any) was still appended.
    Busy,
    /// No threshold exceeded, or buffer stats could not be read
    Idle,
    /// A drain round ran to completion
    Drained(DrainReport),
}

impl FlushOutcome {
    pub fn is_busy(&self) -> bool {
        matches!(self, FlushOutcome::Busy)
    }

    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            FlushOutcome::Drained(report) => Some(report),
            _ => None,
        }
    }
}

/// Clears the flush flag when dropped, on every exit path
struct FlushGuard<'a> {
    flushing: &'a Mutex<bool>,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        *self.flushing.lock() = false;
    }
}

/// Drives appends and flush decisions for one buffer directory
pub struct Scheduler {
    store: BufferStore,
    policy: FlushPolicy,
    pipeline: UploadPipeline,
    flushing: Mutex<bool>,
}

impl Scheduler {
    pub fn new(store: BufferStore, policy: FlushPolicy, pipeline: UploadPipeline) -> Self {
        Self {
            store,
            policy,
            pipeline,
            flushing: Mutex::new(false),
        }
    }

    pub fn store(&self) -> &BufferStore {
        &self.store
    }

    /// Whether a trigger currently holds the flush flag
    pub fn is_flushing(&self) -> bool {
        *self.flushing.lock()
    }

    /// Buffer a new record, then flush if thresholds are met
    pub async fn on_event(&self, record: &EventRecord) -> FlushOutcome {
        self.run(Some(record)).await
    }

    /// Periodic check: flush if thresholds are met
    pub async fn on_timer(&self) -> FlushOutcome {
        self.run(None).await
    }

    async fn run(&self, record: Option<&EventRecord>) -> FlushOutcome {
        if let Some(record) = record {
            if let Err(e) = self.store.append(record).await {
                error!(dir = %self.store.dir().display(), error = %e, "Failed to buffer record");
            }
        }

        // Claim the flag before the first await of the flush path
        let Some(_guard) = self.try_begin_flush() else {
            debug!("Flush already in progress");
            return FlushOutcome::Busy;
        };

        let stats = match self.store.collect_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                error!(dir = %self.store.dir().display(), error = %e, "Failed to read buffer stats");
                return FlushOutcome::Idle;
            }
        };

        match self.policy.flush_reason(&stats, SystemTime::now()) {
            Some(reason) => {
                info!(
                    reason = %reason,
                    files = stats.file_count(),
                    buffered = %BufferStats::format_size(stats.total_size()),
                    "Flush thresholds met, draining buffer"
                );
                FlushOutcome::Drained(self.pipeline.drain().await)
            }
            None => FlushOutcome::Idle,
        }
    }

    fn try_begin_flush(&self) -> Option<FlushGuard<'_>> {
        let mut flushing = self.flushing.lock();
        if *flushing {
            return None;
        }
        *flushing = true;
        Some(FlushGuard {
            flushing: &self.flushing,
        })
    }
}
