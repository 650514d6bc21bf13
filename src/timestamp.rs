//! Timestamp handling at both store boundaries.
//!
//! SQLite keeps timestamps as loosely formatted text, Postgres renders
//! `timestamptz` with its own precision and offset notation. Parsing lands
//! everything on `DateTime<Utc>`; normalization drops sub-second digits and
//! the offset so both renderings compare equal.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a timestamp as written by SQLite or Postgres. Values without an
/// offset are taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let zulu = raw.strip_suffix('Z').unwrap_or(raw);
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(zulu, fmt).ok())
                .map(|naive| naive.and_utc())
        })
}

/// Parses the calendar date a value starts with. A trailing time or offset is
/// ignored, never applied: `1977-05-25 00:00:00+03` is still the 25th.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let (date, rest) = NaiveDate::parse_and_remainder(raw.trim(), "%Y-%m-%d").ok()?;
    if rest.is_empty() || rest.starts_with([' ', 'T']) {
        Some(date)
    } else {
        None
    }
}

/// Renders a timestamp at second precision, ignoring fraction and offset.
///
/// Unparseable input falls back to string surgery: everything after the
/// first `.` is dropped, as is a trailing offset, and a `T` separator
/// becomes a space.
pub fn normalize_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => {
            tracing::warn!(value = raw, "timestamp did not parse, comparing raw prefix");
            let head = raw.trim().split('.').next().unwrap_or_default();
            strip_offset(head).replacen('T', " ", 1)
        }
    }
}

fn strip_offset(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix('Z') {
        return stripped;
    }
    // Offsets only appear after the time part, which follows the tenth character.
    match value.get(10..).and_then(|tail| tail.rfind(['+', '-'])) {
        Some(idx) => &value[..10 + idx],
        None => value,
    }
}
