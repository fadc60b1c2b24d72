//! Buffer file naming
//!
//! One file per local calendar day, named `YYYY-M-D.log` without zero
//! padding. Only names matching the date pattern are eligible for upload.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BUFFER_FILE_PATTERN: Regex =
        Regex::new(r"^\d{4}-(0?[1-9]|1[0-2])-(0?[1-9]|[1-2]\d|3[0-1])\.log$").unwrap();
}

/// Buffer file name for a given day
pub fn file_name_for(date: NaiveDate) -> String {
    format!("{}-{}-{}.log", date.year(), date.month(), date.day())
}

/// Whether `name` is a well-formed buffer file name
pub fn is_buffer_file_name(name: &str) -> bool {
    BUFFER_FILE_PATTERN.is_match(name)
}
