//! Post dates.
//!
//! Dates are stored in the site model as `YYYY-MM-DD HH:MM:SS` strings, so
//! sorting posts by date is a plain string comparison.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats accepted in front matter, tried in order.
const INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn format_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a front-matter date.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` (space or `T`) and RFC 3339
/// with an offset, which is converted to UTC.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.naive_utc());
    }
    // YAML timestamps written with a space before the offset
    if let Ok(date) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(date.naive_utc());
    }
    if let Some(date) = INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(date);
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Midnight of a calendar date taken from a `YYYY-MM-DD-title` file name.
pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0))
}
