//! Archive sink - durable JSONL archive on a local or mounted volume
//!
//! Delivered records are appended to `<dir>/<YYYY-MM-DD>.jsonl`, keyed by the
//! record's UTC creation date, and fsynced before the push resolves.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::RemoteSink;
use crate::error::DeliveryError;
use crate::types::EventRecord;

/// Sink writing records into dated archive files
pub struct ArchiveSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ArchiveSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive file a record belongs to
    pub fn archive_path(&self, record: &EventRecord) -> PathBuf {
        self.dir
            .join(format!("{}.jsonl", record.created_at.format("%Y-%m-%d")))
    }

    async fn write(&self, record: &EventRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.archive_path(record))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteSink for ArchiveSink {
    async fn push(&self, record: EventRecord) -> Result<(), DeliveryError> {
        self.write(&record).await.map_err(|e| {
            DeliveryError::new(format!(
                "archive write to {} failed: {}",
                self.dir.display(),
                e
            ))
        })
    }
}
