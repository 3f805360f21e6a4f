//! On-disk timestamp formats.
//!
//! Run directories and image files are named with a colon-free ISO-8601
//! stamp (millisecond precision) so the names are valid on every
//! filesystem. Log rows and heartbeats carry fractional unix seconds.

use chrono::{DateTime, Utc};

/// Format for run-directory and image-file names.
pub const FILE_STAMP_FORMAT: &str = "%Y-%m-%dT%Hh%Mm%Ss%.3f";

/// Format for the human-readable datetime column of the image log.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders a timestamp for use in file and directory names.
#[must_use]
pub fn file_stamp(ts: DateTime<Utc>) -> String {
    ts.format(FILE_STAMP_FORMAT).to_string()
}

/// Renders the image-log datetime column.
#[must_use]
pub fn datetime_column(ts: DateTime<Utc>) -> String {
    ts.format(DATETIME_FORMAT).to_string()
}

/// Fractional seconds since the unix epoch.
#[must_use]
pub fn unix_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Converts fractional unix seconds back to a timestamp.
///
/// Rounds to the nearest microsecond so values written by
/// [`unix_seconds`] convert back exactly. Returns `None` for values
/// outside chrono's representable range.
#[must_use]
pub fn from_unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64)
}
