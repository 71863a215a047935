//! Timestamp and coordinate parsing for occurrence exports.
//!
//! The reporting channel has produced several timestamp layouts over time
//! (ISO 8601, space-separated, Brazilian day-first, epoch milliseconds), so
//! parsing tries each known layout in turn.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Parses a textual occurrence timestamp.
///
/// Offsets in RFC 3339 values are dropped and the wall-clock time kept, so
/// that date filtering compares calendar days as they were reported.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date.and_time(chrono::NaiveTime::MIN));
        }
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(parse_epoch_millis);
    }

    None
}

/// Converts epoch milliseconds (as emitted by JSON exporters) to a UTC
/// wall-clock timestamp.
#[must_use]
pub fn parse_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Parses a strict `YYYY-MM-DD` calendar date.
#[must_use]
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parses a coordinate from a JSON value.
///
/// Returns `Ok(None)` for `null`, missing or blank values, and `Err(raw)`
/// with the raw text when the value is present but not numeric.
pub fn parse_coordinate(value: Option<&serde_json::Value>) -> Result<Option<f64>, String> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| n.to_string()),
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .replace(',', ".")
                .parse::<f64>()
                .map(Some)
                .map_err(|_| s.clone())
        }
        Some(other) => Err(other.to_string()),
    }
}
