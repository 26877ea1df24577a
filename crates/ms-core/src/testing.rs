//! Shared fixtures for unit tests.

use chrono::DateTime;

use crate::interval::{Interval, Moment};

/// Seconds after the Unix epoch.
pub fn at(secs: i64) -> Moment {
    DateTime::from_timestamp(secs, 0).expect("timestamp in range")
}

pub fn span(start: i64, end: i64) -> Interval {
    Interval::new(at(start), at(end)).expect("valid test interval")
}
