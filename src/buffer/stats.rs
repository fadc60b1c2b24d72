//! Buffer Statistics
//!
//! Point-in-time view of the buffer directory, consumed by the flush policy
//! and by drain logging.

use std::io::ErrorKind;

use super::store::{BufferFileStat, BufferStore};
use crate::error::{BufferError, BufferResult};

/// Statistics about every file currently in the buffer directory
#[derive(Debug, Clone, Default)]
pub struct BufferStats {
    pub files: Vec<BufferFileStat>,
}

impl BufferStats {
    pub fn new(files: Vec<BufferFileStat>) -> Self {
        Self { files }
    }

    /// Number of buffer files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Combined size of all buffer files in bytes
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Format size in human-readable format
    pub fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

impl BufferStore {
    /// Stat every listed buffer file
    ///
    /// A file removed between listing and stat is left out.
    pub async fn collect_stats(&self) -> BufferResult<BufferStats> {
        let mut files = Vec::new();

        for name in self.list_files().await? {
            match self.stat(&name).await {
                Ok(stat) => files.push(stat),
                Err(BufferError::Io(e)) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(BufferStats::new(files))
    }
}
