//! Local Buffer Module
//!
//! This module provides the durable local side of the shipper:
//! - `BufferStore`: append-only per-day files of JSON lines
//! - `BufferStats`: sizes and ages used by the flush policy
//! - naming helpers for `YYYY-M-D.log` files
//!
//! # Layout
//!
//! ```text
//! <local_path>/
//! ├── 2024-3-8.log    ← yesterday, waiting for upload
//! └── 2024-3-9.log    ← today, still receiving appends
//! ```

mod naming;
mod stats;
mod store;

pub use naming::{file_name_for, is_buffer_file_name};
pub use stats::BufferStats;
pub use store::{BufferFileStat, BufferLines, BufferStore};
