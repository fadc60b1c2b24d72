//! Shipper configuration
//!
//! Built from defaults, explicit setters, or `SHIPPER_*` environment
//! variables.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ShipperResult};
use crate::flush::FlushThresholds;
use crate::types::DEFAULT_BODY_SIZE_LIMIT;

/// Longest accepted timer period, in seconds (one year)
pub const MAX_INTERVAL_TIME: u64 = 365 * 24 * 60 * 60;

/// What a drain does when a buffer file name fails the date pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidNamePolicy {
    /// Stop the whole drain round at the first malformed name
    #[default]
    AbortRound,
    /// Skip only the malformed file and keep draining
    Skip,
}

impl FromStr for InvalidNamePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort_round" => Ok(InvalidNamePolicy::AbortRound),
            "skip" => Ok(InvalidNamePolicy::Skip),
            _ => Err(ConfigError::InvalidValue {
                key: "SHIPPER_INVALID_NAME_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for a shipper instance
#[derive(Debug, Clone)]
pub struct ShipperConfig {
    /// Directory holding buffer files
    pub local_path: PathBuf,
    /// Flush when more than this many buffer files exist
    pub files_limit: usize,
    /// Flush when any buffer file grows past this many KB
    pub file_size_limit_kb: u64,
    /// Flush when any buffer file is at least this old, in seconds
    pub file_expire_time: u64,
    /// Seconds between timer-driven flush checks
    pub interval_time: u64,
    /// Captured bodies larger than this (serialized, in bytes) are replaced by `{}`
    pub body_size_limit: usize,
    pub invalid_name_policy: InvalidNamePolicy,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            local_path: PathBuf::from("logs"),
            files_limit: 1,
            file_size_limit_kb: 10,
            file_expire_time: 10,
            interval_time: 10,
            body_size_limit: DEFAULT_BODY_SIZE_LIMIT,
            invalid_name_policy: InvalidNamePolicy::AbortRound,
        }
    }
}

impl ShipperConfig {
    /// Create config with custom buffer directory
    pub fn new<P: AsRef<Path>>(local_path: P) -> Self {
        Self {
            local_path: local_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Build config from `SHIPPER_*` environment variables, falling back to defaults
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `SHIPPER_LOCAL_PATH` | buffer directory (relative to cwd if not absolute) |
    /// | `SHIPPER_FILES_LIMIT` | file-count threshold |
    /// | `SHIPPER_FILE_SIZE_LIMIT` | size threshold in KB |
    /// | `SHIPPER_FILE_EXPIRE_TIME` | age threshold in seconds |
    /// | `SHIPPER_INTERVAL_TIME` | timer period in seconds |
    /// | `SHIPPER_INVALID_NAME_POLICY` | `abort` or `skip` |
    pub fn from_env() -> ShipperResult<Self> {
        let mut config = Self::default();

        if let Ok(path) = env::var("SHIPPER_LOCAL_PATH") {
            config.local_path = if Path::new(&path).is_absolute() {
                PathBuf::from(path)
            } else {
                let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                current_dir.join(path)
            };
        }

        if let Some(v) = parse_env("SHIPPER_FILES_LIMIT")? {
            config.files_limit = v;
        }
        if let Some(v) = parse_env("SHIPPER_FILE_SIZE_LIMIT")? {
            config.file_size_limit_kb = v;
        }
        if let Some(v) = parse_env("SHIPPER_FILE_EXPIRE_TIME")? {
            config.file_expire_time = v;
        }
        if let Some(v) = parse_env("SHIPPER_INTERVAL_TIME")? {
            config.interval_time = v;
        }
        if let Ok(policy) = env::var("SHIPPER_INVALID_NAME_POLICY") {
            config.invalid_name_policy = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject timer periods that would spin (zero) or overflow the clock
    pub fn validate(&self) -> ShipperResult<()> {
        if self.interval_time == 0 || self.interval_time > MAX_INTERVAL_TIME {
            return Err(ConfigError::InvalidValue {
                key: "interval_time".to_string(),
                value: self.interval_time.to_string(),
            });
        }
        Ok(())
    }

    pub fn with_files_limit(mut self, files_limit: usize) -> Self {
        self.files_limit = files_limit;
        self
    }

    pub fn with_file_size_limit_kb(mut self, kb: u64) -> Self {
        self.file_size_limit_kb = kb;
        self
    }

    pub fn with_file_expire_time(mut self, secs: u64) -> Self {
        self.file_expire_time = secs;
        self
    }

    pub fn with_interval_time(mut self, secs: u64) -> Self {
        self.interval_time = secs;
        self
    }

    pub fn with_invalid_name_policy(mut self, policy: InvalidNamePolicy) -> Self {
        self.invalid_name_policy = policy;
        self
    }

    /// Flush thresholds derived from this config
    pub fn thresholds(&self) -> FlushThresholds {
        FlushThresholds {
            files_limit: self.files_limit,
            file_size_limit: self.file_size_limit_kb.saturating_mul(1024),
            file_expire_time: Duration::from_secs(self.file_expire_time),
        }
    }

    /// Timer period
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_time)
    }
}

fn parse_env<T: FromStr>(key: &str) -> ShipperResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
