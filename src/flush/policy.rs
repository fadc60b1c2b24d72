//! Flush Policy - decides when buffered files should be shipped

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::buffer::BufferStats;
use crate::utils::age_since;

/// Immutable thresholds that trigger a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushThresholds {
    /// Flush when more than this many files are buffered
    pub files_limit: usize,
    /// Flush when any file is larger than this, in bytes
    pub file_size_limit: u64,
    /// Flush when any file is at least this old
    pub file_expire_time: Duration,
}

/// The first threshold found exceeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushReason {
    TooManyFiles { count: usize, limit: usize },
    FileTooLarge { file: String, size: u64, limit: u64 },
    FileExpired { file: String, age: Duration },
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushReason::TooManyFiles { count, limit } => {
                write!(f, "{} files buffered (limit {})", count, limit)
            }
            FlushReason::FileTooLarge { file, size, limit } => {
                write!(f, "{} is {} bytes (limit {})", file, size, limit)
            }
            FlushReason::FileExpired { file, age } => {
                write!(f, "{} is {}s old", file, age.as_secs())
            }
        }
    }
}

/// Pure decision function over buffer statistics
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    thresholds: FlushThresholds,
}

impl FlushPolicy {
    pub fn new(thresholds: FlushThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &FlushThresholds {
        &self.thresholds
    }

    /// Whether a flush should happen now
    pub fn should_flush(&self, stats: &BufferStats, now: SystemTime) -> bool {
        self.flush_reason(stats, now).is_some()
    }

    /// First exceeded threshold, checking file count, then each file's size and age
    pub fn flush_reason(&self, stats: &BufferStats, now: SystemTime) -> Option<FlushReason> {
        let t = &self.thresholds;

        if stats.file_count() > t.files_limit {
            return Some(FlushReason::TooManyFiles {
                count: stats.file_count(),
                limit: t.files_limit,
            });
        }

        for file in &stats.files {
            if file.size > t.file_size_limit {
                return Some(FlushReason::FileTooLarge {
                    file: file.name.clone(),
                    size: file.size,
                    limit: t.file_size_limit,
                });
            }

            let age = age_since(file.created, now);
            if age >= t.file_expire_time {
                return Some(FlushReason::FileExpired {
                    file: file.name.clone(),
                    age,
                });
            }
        }

        None
    }
}
