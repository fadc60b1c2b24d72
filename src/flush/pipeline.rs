//! Upload Pipeline - moves buffered records into the remote sink
//!
//! Each eligible buffer file is read line by line. Every parsed record is
//! pushed and acknowledged before the next line is read. The file is deleted
//! only once all of its lines were delivered or skipped as unparseable.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::buffer::{is_buffer_file_name, BufferStore};
use crate::config::InvalidNamePolicy;
use crate::error::{BufferError, DrainError};
use crate::sink::RemoteSink;
use crate::types::EventRecord;

/// Summary of one drain round
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Files visited, including malformed names
    pub files_examined: usize,
    pub files_deleted: usize,
    pub records_delivered: usize,
    /// Lines that failed to parse and were dropped
    pub records_skipped: usize,
    /// Malformed file names seen this round, under either policy
    pub invalid_files: Vec<String>,
    /// Malformed file name that ended the round under `InvalidNamePolicy::AbortRound`
    pub aborted_on: Option<String>,
    /// Error that stopped the round, if any. The named file is kept for retry.
    pub failure: Option<DrainError>,
}

impl DrainReport {
    /// True when the round ended without a local or delivery error
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Drains buffer files into a remote sink
#[derive(Clone)]
pub struct UploadPipeline {
    store: BufferStore,
    sink: Arc<dyn RemoteSink>,
    invalid_name_policy: InvalidNamePolicy,
}

impl UploadPipeline {
    pub fn new(
        store: BufferStore,
        sink: Arc<dyn RemoteSink>,
        invalid_name_policy: InvalidNamePolicy,
    ) -> Self {
        Self {
            store,
            sink,
            invalid_name_policy,
        }
    }

    /// Deliver and delete every eligible buffer file
    ///
    /// Works from a snapshot of the file list taken at the start. Stops at the
    /// first local IO or delivery error; that file and everything after it
    /// stay in place for the next round.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();

        let files = match self.store.list_files().await {
            Ok(files) => files,
            Err(source) => {
                error!(dir = %self.store.dir().display(), error = %source, "Failed to list buffer files");
                report.failure = Some(DrainError::Buffer {
                    file: self.store.dir().display().to_string(),
                    source,
                });
                return report;
            }
        };

        for name in files {
            report.files_examined += 1;

            if !is_buffer_file_name(&name) {
                match self.invalid_name_policy {
                    InvalidNamePolicy::AbortRound => {
                        warn!(file = %name, "Malformed buffer file name, ending drain round");
                        report.invalid_files.push(name.clone());
                        report.aborted_on = Some(name);
                        break;
                    }
                    InvalidNamePolicy::Skip => {
                        warn!(file = %name, "Malformed buffer file name, skipping");
                        report.invalid_files.push(name);
                        continue;
                    }
                }
            }

            if let Err(e) = self.drain_file(&name, &mut report).await {
                error!(file = %name, error = %e, "Drain stopped, file kept for retry");
                report.failure = Some(e);
                break;
            }
        }

        info!(
            files_examined = report.files_examined,
            files_deleted = report.files_deleted,
            delivered = report.records_delivered,
            skipped = report.records_skipped,
            success = report.is_success(),
            "Drain round finished"
        );

        report
    }

    async fn drain_file(&self, name: &str, report: &mut DrainReport) -> Result<(), DrainError> {
        let buffer_err = |source: BufferError| DrainError::Buffer {
            file: name.to_string(),
            source,
        };

        let mut lines = self.store.read_lines(name).await.map_err(buffer_err)?;
        let mut line_number = 0usize;

        loop {
            let line = match lines.next_line().await.map_err(buffer_err)? {
                Some(line) => line,
                None => {
                    // Re-check under the append lock so nothing lands between EOF and delete
                    let _appends = self.store.lock_appends().await;
                    match lines.next_line().await.map_err(buffer_err)? {
                        Some(line) => line,
                        None => {
                            self.store.delete(name).await.map_err(buffer_err)?;
                            break;
                        }
                    }
                }
            };
            line_number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record = match EventRecord::from_json_line(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(file = %name, line = line_number, error = %e, "Skipping unparseable buffer line");
                    report.records_skipped += 1;
                    continue;
                }
            };

            self.sink
                .push(record)
                .await
                .map_err(|source| DrainError::Delivery {
                    file: name.to_string(),
                    source,
                })?;
            report.records_delivered += 1;
            debug!(file = %name, line = line_number, "Record delivered");
        }

        report.files_deleted += 1;
        debug!(file = %name, "Buffer file drained and deleted");
        Ok(())
    }
}
