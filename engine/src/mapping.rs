//! Destination mapping.
//!
//! Pure computation of a library-relative destination from an organizing
//! timestamp: `YYYY/MM/<sanitized file name>`, zero-padded. Timestamps
//! outside the 1900-2100 sanity window fall back to the current date; the
//! fallback is surfaced through `used_date_fallback` so callers can log it
//! instead of silently misfiling.

use chrono::{Datelike, Local, NaiveDateTime};

/// Earliest year considered a plausible capture date.
pub const MIN_PLAUSIBLE_YEAR: i32 = 1900;
/// Latest year considered a plausible capture date.
pub const MAX_PLAUSIBLE_YEAR: i32 = 2100;

/// A computed library-relative destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedDestination {
    /// `"YYYY/MM/name"` with forward slashes, relative to the library root
    pub relative_path: String,

    /// True when the timestamp was implausible and the current date was
    /// used instead
    pub used_date_fallback: bool,
}

/// Map a timestamp and file name to a `YYYY/MM/name` relative path.
pub fn map_destination(timestamp: NaiveDateTime, file_name: &str) -> MappedDestination {
    let (date, used_date_fallback) =
        if timestamp.year() < MIN_PLAUSIBLE_YEAR || timestamp.year() > MAX_PLAUSIBLE_YEAR {
            (Local::now().naive_local().date(), true)
        } else {
            (timestamp.date(), false)
        };

    MappedDestination {
        relative_path: format!(
            "{:04}/{:02}/{}",
            date.year(),
            date.month(),
            sanitize_file_name(file_name)
        ),
        used_date_fallback,
    }
}

/// Replace path separators, NUL bytes, control characters, and characters
/// illegal in common filesystems with `_`. An empty result becomes
/// `"unnamed"`.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}
