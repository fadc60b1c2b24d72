//! Request Log Shipper
//!
//! Captures per-request events from an axum application, buffers them in
//! append-only per-day files on local disk, and ships them to a remote store
//! once size, count or age thresholds are met.
//!
//! # Features
//!
//! - **Never blocks requests**: buffering runs on a spawned task
//! - **Survives outages**: a file is deleted only after every record in it was delivered
//! - **Serialized flushes**: at most one drain runs at a time
//! - **Bounded records**: oversized bodies are replaced by `{}`
//!
//! # Modules
//!
//! - `types`: Event record model
//! - `buffer`: Local buffer store and statistics
//! - `flush`: Flush policy, upload pipeline and scheduler
//! - `sink`: Remote sink trait and built-in sinks
//! - `capture`: Request filtering and axum middleware
//! - `engine`: `Shipper` facade and periodic flush task
//! - `config`: Configuration and environment loading
//! - `error`: Error types
//! - `utils`: Time helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use request_log_shipper::{capture::with_capture, ArchiveSink, Shipper, ShipperConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let shipper = Shipper::builder(ShipperConfig::from_env()?)
//!         .sink(Arc::new(ArchiveSink::new("archive")))
//!         .filter(|parts| parts.uri.path() != "/health")
//!         .identity_resolver(|_| None)
//!         .resource_resolver(|_| None)
//!         .build()?;
//!     let timer = shipper.start();
//!
//!     let app = with_capture(Router::new().route("/", get(|| async { "hi" })), shipper);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3030").await?;
//!     axum::serve(listener, app).await?;
//!
//!     timer.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod flush;
pub mod sink;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use buffer::{BufferStats, BufferStore};
pub use capture::StrictFields;
pub use config::{InvalidNamePolicy, ShipperConfig};
pub use engine::{FlushTaskHandle, Shipper, ShipperBuilder};
pub use error::{BufferError, ConfigError, DeliveryError, DrainError};
pub use flush::{DrainReport, FlushOutcome, FlushPolicy, FlushThresholds};
pub use sink::{ArchiveSink, MemorySink, RemoteSink};
pub use types::{EventRecord, PendingRecord, RecordStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
