//! Argument parsers for the command line.
//!
//! These enforce the request-shape rules (name and serial lengths, time
//! formats) before anything reaches the services.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Serial numbers are 3 to 30 characters.
pub const SERIAL_LEN: std::ops::RangeInclusive<usize> = 3..=30;

/// User names are 2 to 100 characters.
pub const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=100;

fn bounded(
    value: &str,
    what: &str,
    range: std::ops::RangeInclusive<usize>,
) -> Result<String, String> {
    let len = value.chars().count();
    if range.contains(&len) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "{} must be between {} and {} characters (got {})",
            what,
            range.start(),
            range.end(),
            len
        ))
    }
}

/// clap value parser for a device serial number.
pub fn serial_number(value: &str) -> Result<String, String> {
    bounded(value, "serial number", SERIAL_LEN)
}

/// clap value parser for a user name.
pub fn user_name(value: &str) -> Result<String, String> {
    bounded(value, "name", NAME_LEN)
}

/// clap value parser for a period bound.
///
/// Accepts RFC3339 (`2025-04-11T02:27:36Z`, with any offset), a naive
/// date-time (`2025-04-11T02:27:36` or with a space) read as UTC, or a bare
/// date meaning midnight UTC.
pub fn timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(format!("invalid timestamp '{}': expected RFC3339", value))
}
