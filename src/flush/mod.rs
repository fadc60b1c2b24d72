//! Flush Module
//!
//! This module decides when and how buffered records leave the machine:
//! - `FlushPolicy`: pure threshold check over `BufferStats`
//! - `UploadPipeline`: drains buffer files into a `RemoteSink`
//! - `Scheduler`: funnels events and timer ticks into one serialized flush
//!
//! # Flow
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐    ┌────────────┐
//! │ on_event │───►│ append to    │───►│ should_flush │───►│ drain()    │
//! │ on_timer │    │ YYYY-M-D.log │    │ (count/size/ │    │ push, then │
//! └──────────┘    └──────────────┘    │  age)        │    │ delete     │
//!                                     └──────────────┘    └────────────┘
//! ```

mod pipeline;
mod policy;
mod scheduler;

pub use pipeline::{DrainReport, UploadPipeline};
pub use policy::{FlushPolicy, FlushReason, FlushThresholds};
pub use scheduler::{FlushOutcome, Scheduler};
