//! Utility functions and helpers
//!
//! This module contains clock and date helpers shared by the buffer store
//! and the flush policy.

pub mod time;

pub use time::{age_since, local_today};
