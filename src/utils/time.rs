//! Time and date utilities

use std::time::{Duration, SystemTime};

use chrono::{Local, NaiveDate};

/// Current calendar date in the local timezone
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Elapsed time between `since` and `now`
///
/// Clock skew (a `since` in the future) yields zero rather than an error.
pub fn age_since(since: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(since).unwrap_or(Duration::ZERO)
}
