//! Source and library scanning.
//!
//! Recursive enumeration of a source tree into candidate media items, and a
//! fallback enumeration of the library content used when no baseline index
//! exists. Both walks produce deterministic, lexicographically path-sorted
//! output.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::ScanError;
use crate::layout::CONTROL_DIR_NAME;
use crate::model::CandidateMediaItem;

/// Enumerate all media files under a source root.
///
/// `media_types` is a set of lower-case extensions; an empty set admits
/// every file. Hidden files and directories (dot-prefixed) are skipped.
/// Results are sorted by absolute path.
pub fn scan_source(
    root: &Path,
    media_types: &[String],
) -> Result<Vec<CandidateMediaItem>, ScanError> {
    validate_root(root)?;

    let mut items = Vec::new();
    walk_source(root, media_types, &mut items)?;
    items.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(items)
}

fn walk_source(
    dir: &Path,
    media_types: &[String],
    items: &mut Vec<CandidateMediaItem>,
) -> Result<(), ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::ReadDirFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ScanError::ReadDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| ScanError::ReadDirFailed {
            path: entry.path(),
            source: e,
        })?;

        if metadata.is_dir() {
            walk_source(&entry.path(), media_types, items)?;
        } else if metadata.is_file() && matches_media_types(&file_name, media_types) {
            let modification_date: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());

            items.push(CandidateMediaItem {
                path: entry.path(),
                size: metadata.len(),
                modification_date,
                file_name,
            });
        }
    }

    Ok(())
}

/// Enumerate the relative paths of all library content files, skipping the
/// `.mediahub` control directory. Used for path comparison when no index
/// exists.
pub fn scan_library_paths(library_root: &Path) -> Result<BTreeSet<String>, ScanError> {
    validate_root(library_root)?;

    let mut paths = BTreeSet::new();
    walk_library(library_root, "", &mut paths)?;
    Ok(paths)
}

fn walk_library(
    dir: &Path,
    rel_prefix: &str,
    paths: &mut BTreeSet<String>,
) -> Result<(), ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::ReadDirFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ScanError::ReadDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name == CONTROL_DIR_NAME || file_name.starts_with('.') {
            continue;
        }

        let rel = if rel_prefix.is_empty() {
            file_name.clone()
        } else {
            format!("{}/{}", rel_prefix, file_name)
        };

        let metadata = entry.metadata().map_err(|e| ScanError::ReadDirFailed {
            path: entry.path(),
            source: e,
        })?;

        if metadata.is_dir() {
            walk_library(&entry.path(), &rel, paths)?;
        } else if metadata.is_file() {
            paths.insert(rel);
        }
    }

    Ok(())
}

/// Normalized relative path of `path` under `root`, with `/` separators,
/// or `None` if `path` is not under `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn validate_root(root: &Path) -> Result<(), ScanError> {
    match fs::metadata(root) {
        Ok(m) if m.is_dir() => Ok(()),
        Ok(_) => Err(ScanError::NotADirectory {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ScanError::RootNotFound {
            path: root.to_path_buf(),
        }),
        Err(e) => Err(ScanError::ReadDirFailed {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

fn matches_media_types(file_name: &str, media_types: &[String]) -> bool {
    if media_types.is_empty() {
        return true;
    }
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => return false,
    };
    media_types.iter().any(|t| t == &extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dirs");
        }
        fs::write(path, bytes).expect("Failed to write file");
    }

    #[test]
    fn test_scan_source_sorted_and_recursive() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write(&root.join("z.jpg"), b"z");
        write(&root.join("albums").join("a.jpg"), b"a");
        write(&root.join("albums").join("b.png"), b"b");

        let items = scan_source(root, &[]).expect("Failed to scan");
        let names: Vec<_> = items.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "z.jpg"]);
        assert!(items.windows(2).all(|w| w[0].path < w[1].path));
    }

    #[test]
    fn test_scan_source_filters_by_media_type() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write(&root.join("photo.JPG"), b"p");
        write(&root.join("notes.txt"), b"n");
        write(&root.join("clip.mp4"), b"c");

        let items =
            scan_source(root, &["jpg".to_string(), "mp4".to_string()]).expect("Failed to scan");
        let names: Vec<_> = items.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["clip.mp4", "photo.JPG"]);
    }

    #[test]
    fn test_scan_source_skips_hidden_entries() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write(&root.join(".hidden.jpg"), b"h");
        write(&root.join(".cache").join("thumb.jpg"), b"t");
        write(&root.join("visible.jpg"), b"v");

        let items = scan_source(root, &[]).expect("Failed to scan");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file_name, "visible.jpg");
    }

    #[test]
    fn test_scan_source_missing_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = scan_source(&temp_dir.path().join("absent"), &[]);
        assert!(matches!(result, Err(ScanError::RootNotFound { .. })));
    }

    #[test]
    fn test_scan_library_paths_skips_control_dir() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        write(&root.join("2024").join("05").join("a.jpg"), b"a");
        write(&root.join(".mediahub").join("registry").join("index.json"), b"{}");

        let paths = scan_library_paths(root).expect("Failed to scan");
        assert_eq!(
            paths.into_iter().collect::<Vec<_>>(),
            vec!["2024/05/a.jpg".to_string()]
        );
    }

    #[test]
    fn test_relative_path_normalizes_separators() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        let nested = root.join("a").join("b").join("c.jpg");
        assert_eq!(relative_path(root, &nested), Some("a/b/c.jpg".to_string()));
        assert_eq!(relative_path(&nested, root), None);
    }
}
