//! Date parsing and formatting for date attributes.

use super::Value;
use crate::error::RecordError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Format applied to date attributes when neither the schema nor the
/// configuration sets one, e.g. `Monday, 15-Jan-24 10:30:00 UTC`.
pub const DEFAULT_DATE_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// Format used to store and serialize raw timestamps.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PARSE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Current time as stored by timestamp columns.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Interpret a raw value as a point in time.
///
/// Accepts timestamps, the common SQL/ISO-8601 textual forms, plain dates
/// (midnight) and integer unix timestamps.
pub fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        Value::String(s) => parse_str(s.trim()),
        _ => None,
    }
}

fn parse_str(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Format a timestamp with a strftime-style pattern.
///
/// An invalid pattern is reported instead of panicking inside `Display`.
pub fn format_datetime(dt: &NaiveDateTime, format: &str) -> Result<String, RecordError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(RecordError::TypeMismatch(format!(
            "invalid date format `{format}`"
        )));
    }
    Ok(dt.format_with_items(items.into_iter()).to_string())
}
