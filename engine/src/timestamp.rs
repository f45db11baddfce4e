//! Organizing-timestamp extraction.
//!
//! Prefers the embedded capture time (EXIF `DateTimeOriginal`, local time,
//! `"YYYY:MM:DD HH:MM:SS"`) when it is present, parseable, and inside the
//! plausibility window; otherwise falls back to the filesystem modification
//! time. The returned provenance tag flows into the import result.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Datelike, Local, NaiveDateTime};
use exif::{In, Tag, Value};

use crate::error::TimestampError;
use crate::mapping::{MAX_PLAUSIBLE_YEAR, MIN_PLAUSIBLE_YEAR};
use crate::model::TimestampSource;

/// EXIF datetime layout, e.g. `2016:05:04 03:02:01`.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Extract the organizing timestamp for a file.
///
/// Fails only when the file is wholly inaccessible: embedded-metadata
/// problems of any kind (missing tag, unparseable value, implausible date,
/// unreadable container) silently defer to the filesystem modification
/// time.
pub fn extract_timestamp(
    path: &Path,
) -> Result<(NaiveDateTime, TimestampSource), TimestampError> {
    if let Some(embedded) = embedded_capture_time(path) {
        return Ok((embedded, TimestampSource::Embedded));
    }

    let metadata = std::fs::metadata(path).map_err(|e| TimestampError::Inaccessible {
        path: path.to_path_buf(),
        source: e,
    })?;
    let modified = metadata.modified().map_err(|e| TimestampError::Inaccessible {
        path: path.to_path_buf(),
        source: e,
    })?;

    let local: DateTime<Local> = modified.into();
    Ok((local.naive_local(), TimestampSource::Filesystem))
}

/// Best-effort read of EXIF `DateTimeOriginal`.
fn embedded_capture_time(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;

    let raw = match &field.value {
        Value::Ascii(values) => values.first().map(|v| String::from_utf8_lossy(v).into_owned()),
        _ => None,
    }?;

    let parsed = NaiveDateTime::parse_from_str(raw.trim(), EXIF_DATETIME_FORMAT).ok()?;
    if parsed.year() < MIN_PLAUSIBLE_YEAR || parsed.year() > MAX_PLAUSIBLE_YEAR {
        return None;
    }
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_plain_file_falls_back_to_filesystem_mtime() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("note.txt");
        fs::write(&file, b"no exif here").expect("Failed to write file");

        let (timestamp, source) = extract_timestamp(&file).expect("Failed to extract");
        assert_eq!(source, TimestampSource::Filesystem);

        // The mtime of a file created just now is the current year.
        assert_eq!(timestamp.year(), Local::now().year());
    }

    #[test]
    fn test_fs_fallback_reflects_set_mtime() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("clip.mp4");
        fs::write(&file, b"video bytes").expect("Failed to write file");

        // 2020-06-15 00:00:00 UTC
        let mtime = filetime::FileTime::from_unix_time(1_592_179_200, 0);
        filetime::set_file_mtime(&file, mtime).expect("Failed to set mtime");

        let (timestamp, source) = extract_timestamp(&file).expect("Failed to extract");
        assert_eq!(source, TimestampSource::Filesystem);
        assert_eq!(timestamp.year(), 2020);
    }

    #[test]
    fn test_missing_file_is_inaccessible() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = extract_timestamp(&temp_dir.path().join("absent.jpg"));
        assert!(matches!(result, Err(TimestampError::Inaccessible { .. })));
    }

    #[test]
    fn test_garbage_bytes_are_not_treated_as_embedded_metadata() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("broken.jpg");
        fs::write(&file, b"\xff\xd8garbage that is not exif").expect("Failed to write file");

        let (_, source) = extract_timestamp(&file).expect("Failed to extract");
        assert_eq!(source, TimestampSource::Filesystem);
    }
}
