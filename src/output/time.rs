//! Creation-timestamp parsing and display
//!
//! Runtimes report creation times in several shapes: RFC 3339 from
//! `inspect`, `2006-01-02 15:04:05 -0700 MST` from `ps`, and occasionally a
//! bare `YYYY-MM-DDTHH:MM:SS` prefix. Everything renders as UTC
//! `YYYY-MM-DD HH:MM:SS`; unparseable values pass through untouched.

use chrono::{DateTime, NaiveDateTime, Utc};

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse any of the known timestamp shapes.
pub fn parse_created(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // `ps` style: "2026-01-02 10:11:12 +0000 UTC" (zone name is decorative)
    let without_zone_name = raw
        .rsplit_once(' ')
        .filter(|(_, last)| last.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|(rest, _)| rest)
        .unwrap_or(raw);
    if let Ok(dt) = DateTime::parse_from_str(without_zone_name, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }

    // Bare date-time prefix, assumed UTC
    let prefix: String = raw.chars().take(19).collect();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&prefix, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Render a parsed timestamp for the listing.
pub fn format_created(dt: &DateTime<Utc>) -> String {
    dt.format(DISPLAY_FORMAT).to_string()
}

/// Normalize a raw runtime timestamp for display, passing unknown shapes
/// through as-is.
pub fn normalize_created(raw: &str) -> String {
    match parse_created(raw) {
        Some(dt) => format_created(&dt),
        None => raw.trim().to_string(),
    }
}
