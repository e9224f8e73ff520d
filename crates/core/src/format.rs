//! Display formatting for sizes and timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

pub const JUST_NOW: &str = "Just now";
pub const INVALID_DATE: &str = "Invalid date";

/// Human-readable size with at most two decimals: `"0 Bytes"`, `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exponent = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && exponent < SIZE_UNITS.len() - 1 {
        scaled /= 1024.0;
        exponent += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{rounded} {}", SIZE_UNITS[exponent])
}

/// Parse a backend timestamp. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.and_utc())
}

/// Message timestamp label relative to `now`.
///
/// Missing, future, and sub-minute timestamps read "Just now"; anything
/// older shows the UTC wall-clock time as `HH:MM`.
pub fn format_message_time(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return JUST_NOW.to_string();
    };
    let Some(at) = parse_timestamp(raw) else {
        tracing::debug!(raw, "Unparseable message timestamp");
        return INVALID_DATE.to_string();
    };
    if (now - at).num_minutes() < 1 {
        return JUST_NOW.to_string();
    }
    at.format("%H:%M").to_string()
}

/// Calendar date label, e.g. `"Mar 4, 2025"`.
pub fn format_date(raw: &str) -> String {
    if let Some(at) = parse_timestamp(raw) {
        return at.format("%b %-d, %Y").to_string();
    }
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => date.format("%b %-d, %Y").to_string(),
        Err(_) => INVALID_DATE.to_string(),
    }
}
