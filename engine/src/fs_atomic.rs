//! Crash-safe filesystem writes.
//!
//! Both media copies and JSON documents (index, results, ledger) go through
//! the same discipline: write to a hidden temporary file in the destination
//! directory, verify the byte count, then atomically rename into place. A
//! crash at any point leaves either the old file or a fully written new one,
//! never a partial file; an orphaned temp file is harmless.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{CopyError, WriteError};

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), CopyError> {
    if let Some(parent) = path.parent() {
        if parent.as_os_str().is_empty() {
            return Ok(());
        }

        match fs::metadata(parent) {
            Ok(metadata) => {
                if metadata.is_dir() {
                    Ok(())
                } else {
                    Err(CopyError::DirectoryCreationFailed {
                        path: parent.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "Parent path exists but is not a directory",
                        ),
                    })
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(parent).map_err(|e| CopyError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
                Ok(())
            }
            Err(e) => Err(CopyError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            }),
        }
    } else {
        Ok(())
    }
}

/// Hidden same-directory temp path with a random suffix.
fn temp_sibling(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    dst.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Copy a file to `dst` atomically.
///
/// Validates that the source is a regular, readable file, copies to a
/// same-directory temp file, verifies size equality, and renames into
/// place (replacing an existing destination atomically). The source
/// modification time is preserved on the copy, best-effort. On any failure
/// after the temp file is created, the temp file is deleted best-effort
/// before the error propagates.
pub fn copy_atomically(src: &Path, dst: &Path) -> Result<PathBuf, CopyError> {
    let src_metadata = match fs::metadata(src) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CopyError::SourceNotFound {
                path: src.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(CopyError::CopyFailed {
                path: src.to_path_buf(),
                source: e,
            });
        }
    };
    if !src_metadata.is_file() {
        return Err(CopyError::SourceNotRegularFile {
            path: src.to_path_buf(),
        });
    }

    ensure_parent_dir_exists(dst)?;

    let temp = temp_sibling(dst);

    let copied = fs::copy(src, &temp).map_err(|e| {
        let _ = fs::remove_file(&temp);
        CopyError::CopyFailed {
            path: dst.to_path_buf(),
            source: e,
        }
    })?;

    if copied != src_metadata.len() {
        let _ = fs::remove_file(&temp);
        return Err(CopyError::VerificationFailed {
            path: dst.to_path_buf(),
            expected: src_metadata.len(),
            actual: copied,
        });
    }

    fs::rename(&temp, dst).map_err(|e| {
        let _ = fs::remove_file(&temp);
        CopyError::RenameFailed {
            path: dst.to_path_buf(),
            source: e,
        }
    })?;

    if let Ok(mtime) = src_metadata.modified() {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(dst.to_path_buf())
}

/// Serialize a value as pretty JSON and write it to `path` atomically.
///
/// Serialization happens before anything touches the filesystem, so a
/// serialization failure leaves any existing document untouched.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), WriteError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| WriteError::SerializeFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| WriteError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let temp = temp_sibling(path);

    fs::write(&temp, &bytes).map_err(|e| {
        let _ = fs::remove_file(&temp);
        WriteError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    let written = fs::metadata(&temp).map(|m| m.len()).map_err(|e| {
        let _ = fs::remove_file(&temp);
        WriteError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    if written != bytes.len() as u64 {
        let _ = fs::remove_file(&temp);
        return Err(WriteError::SizeMismatch {
            path: path.to_path_buf(),
            expected: bytes.len() as u64,
            actual: written,
        });
    }

    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        WriteError::RenameFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_copy_atomically_copies_bytes() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("source.txt");
        let dst = temp_dir.path().join("nested").join("dest.txt");
        fs::write(&src, b"test content").expect("Failed to write source");

        let final_path = copy_atomically(&src, &dst).expect("Failed to copy");
        assert_eq!(final_path, dst);
        assert_eq!(
            fs::read_to_string(&dst).expect("Failed to read dest"),
            "test content"
        );
    }

    #[test]
    fn test_copy_atomically_replaces_existing_destination() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("source.txt");
        let dst = temp_dir.path().join("dest.txt");
        fs::write(&src, b"new").expect("Failed to write source");
        fs::write(&dst, b"old").expect("Failed to write dest");

        copy_atomically(&src, &dst).expect("Failed to copy");
        assert_eq!(fs::read_to_string(&dst).expect("read"), "new");
    }

    #[test]
    fn test_copy_atomically_missing_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("absent.txt");
        let dst = temp_dir.path().join("dest.txt");

        let result = copy_atomically(&src, &dst);
        assert!(matches!(result, Err(CopyError::SourceNotFound { .. })));
        assert!(!dst.exists(), "destination must not be created on failure");
    }

    #[test]
    fn test_copy_atomically_rejects_directory_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("dir");
        fs::create_dir(&src).expect("Failed to create dir");
        let dst = temp_dir.path().join("dest.txt");

        let result = copy_atomically(&src, &dst);
        assert!(matches!(result, Err(CopyError::SourceNotRegularFile { .. })));
    }

    #[test]
    fn test_copy_failure_leaves_original_intact() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dest.txt");
        fs::write(&dst, b"original").expect("Failed to write dest");

        let result = copy_atomically(&temp_dir.path().join("absent.txt"), &dst);
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&dst).expect("read"), "original");
    }

    #[test]
    fn test_orphaned_temp_file_is_harmless() {
        // Simulates a crash between temp-file write and rename: a stray
        // hidden temp does not interfere with a later copy to the same name.
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("source.txt");
        let dst = temp_dir.path().join("dest.txt");
        fs::write(&src, b"payload").expect("Failed to write source");

        let stray = temp_dir.path().join(".dest.txt.deadbeef.tmp");
        fs::write(&stray, b"half-written").expect("Failed to write stray temp");

        copy_atomically(&src, &dst).expect("Failed to copy");
        assert_eq!(fs::read_to_string(&dst).expect("read"), "payload");
        assert!(stray.exists(), "stray temp is left alone");
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn test_write_json_atomic_round_trips() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("docs").join("doc.json");
        let doc = Doc {
            name: "index".to_string(),
            count: 3,
        };

        write_json_atomic(&path, &doc).expect("Failed to write");
        let bytes = fs::read(&path).expect("Failed to read");
        let back: Doc = serde_json::from_slice(&bytes).expect("Failed to parse");
        assert_eq!(back, doc);
    }

    #[test]
    fn test_write_json_atomic_replaces_existing_document() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("doc.json");

        write_json_atomic(
            &path,
            &Doc {
                name: "old".to_string(),
                count: 1,
            },
        )
        .expect("Failed to write old");
        write_json_atomic(
            &path,
            &Doc {
                name: "new".to_string(),
                count: 2,
            },
        )
        .expect("Failed to write new");

        let back: Doc =
            serde_json::from_slice(&fs::read(&path).expect("read")).expect("Failed to parse");
        assert_eq!(back.name, "new");
    }

    #[test]
    fn test_write_json_atomic_leaves_no_temp_files_behind() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("doc.json");
        write_json_atomic(
            &path,
            &Doc {
                name: "x".to_string(),
                count: 0,
            },
        )
        .expect("Failed to write");

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "no temp files after a clean write");
    }

    #[test]
    fn test_ensure_parent_dir_exists() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("a").join("b").join("file.txt");

        ensure_parent_dir_exists(&path).expect("Failed to create parent");
        assert!(path.parent().unwrap().exists());
    }
}
