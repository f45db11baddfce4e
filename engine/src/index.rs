//! Baseline index.
//!
//! The index is the library's sole mutable state document: a versioned,
//! path-sorted snapshot of every library file's relative path, size,
//! modification time, and optional content hash. It is read at the start of
//! every detection/import run and rewritten through the atomic-write
//! discipline; entries are superseded by path-keyed merge, never mutated in
//! place.
//!
//! Version `"1.1"` is declared exactly when at least one entry carries a
//! hash, `"1.0"` otherwise; the version is recomputed on every merge, which
//! keeps old hash-less documents loadable and merges idempotent.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::fs_atomic::write_json_atomic;

/// Index version with no hashed entries.
pub const INDEX_VERSION_BASE: &str = "1.0";
/// Index version with at least one hashed entry.
pub const INDEX_VERSION_HASHED: &str = "1.1";

/// One library file. Immutable once created; an update for the same path
/// replaces the whole entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// Normalized library-relative path with `/` separators; unique within
    /// an index
    pub path: String,

    /// File size in bytes
    pub size: u64,

    /// Modification time of the library file
    pub mtime: DateTime<Utc>,

    /// `"sha256:<hex>"` content hash, if one has been computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Versioned, path-sorted snapshot of library file metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaselineIndex {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,

    /// Always equals `entries.len()`
    pub entry_count: usize,

    /// Sorted by path
    pub entries: Vec<IndexEntry>,
}

impl BaselineIndex {
    /// An empty index created at `now`.
    pub fn new_empty(now: DateTime<Utc>) -> Self {
        BaselineIndex {
            version: INDEX_VERSION_BASE.to_string(),
            created: now,
            last_updated: now,
            entry_count: 0,
            entries: Vec::new(),
        }
    }

    /// Build an index from entries, sorting and recomputing the derived
    /// fields.
    pub fn from_entries(entries: Vec<IndexEntry>, now: DateTime<Utc>) -> Self {
        let mut index = BaselineIndex::new_empty(now);
        index.entries = entries;
        index.normalize();
        index
    }

    /// Load and validate an index document.
    ///
    /// Callers are expected to check for file existence first; a missing
    /// file surfaces as an `Io` error here.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = fs::read(path).map_err(|e| IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut index: BaselineIndex =
            serde_json::from_slice(&bytes).map_err(|e| IndexError::Malformed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if index.version != INDEX_VERSION_BASE && index.version != INDEX_VERSION_HASHED {
            return Err(IndexError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: index.version,
            });
        }

        // Re-establish the sorted-entries and count invariants rather than
        // trusting the document.
        index.normalize_preserving_version();
        Ok(index)
    }

    /// Write the index atomically, refusing targets outside the library
    /// root. Containment is checked before anything is created, so a
    /// rejected write leaves no directories behind.
    pub fn write(&self, path: &Path, library_root: &Path) -> Result<(), IndexError> {
        let canonical_root = library_root.canonicalize().map_err(|e| IndexError::Io {
            path: library_root.to_path_buf(),
            source: e,
        })?;

        let (parent, file_name) = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => {
                return Err(IndexError::WriteOutsideLibrary {
                    path: path.to_path_buf(),
                    root: canonical_root,
                });
            }
        };
        let canonical_parent =
            resolve_pending_path(parent).map_err(|e| IndexError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;

        if !canonical_parent.starts_with(&canonical_root) {
            return Err(IndexError::WriteOutsideLibrary {
                path: path.to_path_buf(),
                root: canonical_root,
            });
        }

        // Write to the verified location, so the containment decision and
        // the write cannot diverge.
        write_json_atomic(&canonical_parent.join(file_name), self)?;
        Ok(())
    }

    /// Merge new entries into this index, keyed by path, last write wins.
    ///
    /// Version, entry count, and ordering are recomputed after the merge,
    /// which makes the operation idempotent: re-applying the same entries
    /// produces an identical index (modulo `last_updated`).
    pub fn updating(&self, new_entries: &[IndexEntry], now: DateTime<Utc>) -> BaselineIndex {
        let mut by_path: BTreeMap<String, IndexEntry> = self
            .entries
            .iter()
            .map(|e| (e.path.clone(), e.clone()))
            .collect();
        for entry in new_entries {
            by_path.insert(entry.path.clone(), entry.clone());
        }

        let entries: Vec<IndexEntry> = by_path.into_values().collect();
        let mut merged = BaselineIndex {
            version: String::new(),
            created: self.created,
            last_updated: now,
            entry_count: 0,
            entries,
        };
        merged.recompute_version();
        merged.entry_count = merged.entries.len();
        merged
    }

    /// Paths of all entries.
    pub fn path_set(&self) -> BTreeSet<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// All distinct content hashes.
    pub fn hash_set(&self) -> BTreeSet<String> {
        self.entries.iter().filter_map(|e| e.hash.clone()).collect()
    }

    /// Deterministic representative path per hash: the first path in sorted
    /// order carrying that hash.
    pub fn hash_to_any_path(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for entry in &self.entries {
            if let Some(hash) = &entry.hash {
                map.entry(hash.clone()).or_insert_with(|| entry.path.clone());
            }
        }
        map
    }

    /// Fraction of entries carrying a hash; 0.0 for an empty index.
    pub fn hash_coverage(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let hashed = self.entries.iter().filter(|e| e.hash.is_some()).count();
        hashed as f64 / self.entries.len() as f64
    }

    fn normalize(&mut self) {
        self.normalize_preserving_version();
        self.recompute_version();
    }

    fn normalize_preserving_version(&mut self) {
        self.entries.sort_by(|a, b| a.path.cmp(&b.path));
        self.entries.dedup_by(|a, b| a.path == b.path);
        self.entry_count = self.entries.len();
    }

    fn recompute_version(&mut self) {
        let has_hash = self.entries.iter().any(|e| e.hash.is_some());
        self.version = if has_hash {
            INDEX_VERSION_HASHED.to_string()
        } else {
            INDEX_VERSION_BASE.to_string()
        };
    }
}

/// Canonical form of a directory path that may not exist yet. The path is
/// lexically normalized (`.` dropped, `..` popped), its deepest existing
/// ancestor is canonicalized, and the remaining plain components are
/// appended. Touches nothing on disk.
fn resolve_pending_path(path: &Path) -> Result<std::path::PathBuf, io::Error> {
    let normalized = lexical_normalize(path);

    let mut existing = normalized.as_path();
    let mut pending: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for part in pending.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        pending.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn lexical_normalize(path: &Path) -> std::path::PathBuf {
    let mut out = std::path::PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Load the index if the file exists; `Ok(None)` when it doesn't.
pub fn load_if_present(path: &Path) -> Result<Option<BaselineIndex>, IndexError> {
    match fs::metadata(path) {
        Ok(_) => BaselineIndex::load(path).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, size: u64, hash: Option<&str>) -> IndexEntry {
        IndexEntry {
            path: path.to_string(),
            size,
            mtime: Utc::now(),
            hash: hash.map(|h| h.to_string()),
        }
    }

    #[test]
    fn test_empty_index_is_version_1_0() {
        let index = BaselineIndex::new_empty(Utc::now());
        assert_eq!(index.version, INDEX_VERSION_BASE);
        assert_eq!(index.entry_count, 0);
    }

    #[test]
    fn test_version_follows_hash_presence() {
        let now = Utc::now();
        let without = BaselineIndex::from_entries(vec![entry("a.jpg", 1, None)], now);
        assert_eq!(without.version, INDEX_VERSION_BASE);

        let with = without.updating(&[entry("b.jpg", 2, Some("sha256:ff"))], now);
        assert_eq!(with.version, INDEX_VERSION_HASHED);
    }

    #[test]
    fn test_updating_is_idempotent() {
        let now = Utc::now();
        let base = BaselineIndex::from_entries(vec![entry("a.jpg", 1, None)], now);
        let new_entries = vec![
            entry("b.jpg", 2, Some("sha256:bb")),
            entry("a.jpg", 9, Some("sha256:aa")),
        ];

        let once = base.updating(&new_entries, now);
        let twice = once.updating(&new_entries, now);

        assert_eq!(once.entries, twice.entries);
        assert_eq!(once.version, twice.version);
        assert_eq!(once.entry_count, twice.entry_count);
    }

    #[test]
    fn test_updating_replaces_by_path_last_write_wins() {
        let now = Utc::now();
        let base = BaselineIndex::from_entries(vec![entry("a.jpg", 1, None)], now);
        let updated = base.updating(&[entry("a.jpg", 42, Some("sha256:aa"))], now);

        assert_eq!(updated.entry_count, 1);
        assert_eq!(updated.entries[0].size, 42);
        assert_eq!(updated.entries[0].hash.as_deref(), Some("sha256:aa"));
    }

    #[test]
    fn test_entries_stay_sorted_by_path() {
        let now = Utc::now();
        let index = BaselineIndex::from_entries(
            vec![entry("z.jpg", 1, None), entry("a.jpg", 1, None), entry("m.jpg", 1, None)],
            now,
        );
        let paths: Vec<_> = index.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.jpg", "m.jpg", "z.jpg"]);
    }

    #[test]
    fn test_hash_to_any_path_picks_first_sorted_path() {
        let now = Utc::now();
        let index = BaselineIndex::from_entries(
            vec![
                entry("b/dup.jpg", 1, Some("sha256:same")),
                entry("a/dup.jpg", 1, Some("sha256:same")),
            ],
            now,
        );

        let map = index.hash_to_any_path();
        assert_eq!(map.get("sha256:same").map(String::as_str), Some("a/dup.jpg"));
    }

    #[test]
    fn test_hash_coverage() {
        let now = Utc::now();
        let index = BaselineIndex::from_entries(
            vec![
                entry("a.jpg", 1, Some("sha256:aa")),
                entry("b.jpg", 1, None),
                entry("c.jpg", 1, Some("sha256:cc")),
                entry("d.jpg", 1, None),
            ],
            now,
        );
        assert!((index.hash_coverage() - 0.5).abs() < f64::EPSILON);
        assert_eq!(BaselineIndex::new_empty(now).hash_coverage(), 0.0);
    }

    #[test]
    fn test_round_trip_through_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let library = temp_dir.path();
        let path = library.join(".mediahub").join("registry").join("index.json");

        let now = Utc::now();
        let index = BaselineIndex::from_entries(
            vec![entry("2024/05/a.jpg", 7, Some("sha256:aa"))],
            now,
        );
        index.write(&path, library).expect("Failed to write");

        let loaded = BaselineIndex::load(&path).expect("Failed to load");
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_rejects_unsupported_version() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("index.json");
        let doc = serde_json::json!({
            "version": "9.9",
            "created": Utc::now(),
            "lastUpdated": Utc::now(),
            "entryCount": 0,
            "entries": []
        });
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).expect("Failed to write");

        let result = BaselineIndex::load(&path);
        assert!(matches!(
            result,
            Err(IndexError::UnsupportedVersion { found, .. }) if found == "9.9"
        ));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("index.json");
        std::fs::write(&path, b"{ not json").expect("Failed to write");

        let result = BaselineIndex::load(&path);
        assert!(matches!(result, Err(IndexError::Malformed { .. })));
    }

    #[test]
    fn test_write_outside_library_is_rejected() {
        let library_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let other_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let index = BaselineIndex::new_empty(Utc::now());

        let result = index.write(&other_dir.path().join("index.json"), library_dir.path());
        assert!(matches!(result, Err(IndexError::WriteOutsideLibrary { .. })));
    }

    #[test]
    fn test_rejected_write_creates_nothing_outside_library() {
        let library_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let other_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let index = BaselineIndex::new_empty(Utc::now());

        let target = other_dir.path().join("nested").join("deep").join("index.json");
        let result = index.write(&target, library_dir.path());
        assert!(matches!(result, Err(IndexError::WriteOutsideLibrary { .. })));
        assert!(
            !other_dir.path().join("nested").exists(),
            "rejection must not create directories at the outside target"
        );
    }

    #[test]
    fn test_write_into_not_yet_existing_library_subdir() {
        let library_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let index = BaselineIndex::new_empty(Utc::now());

        let target = library_dir
            .path()
            .join(".mediahub")
            .join("registry")
            .join("index.json");
        index.write(&target, library_dir.path()).expect("Failed to write");
        assert!(target.exists());
    }

    #[test]
    fn test_dot_dot_escape_is_rejected_without_side_effects() {
        let library_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let index = BaselineIndex::new_empty(Utc::now());

        let target = library_dir
            .path()
            .join("inner")
            .join("..")
            .join("..")
            .join("escape")
            .join("index.json");
        let result = index.write(&target, library_dir.path());
        assert!(matches!(result, Err(IndexError::WriteOutsideLibrary { .. })));
        assert!(!library_dir.path().join("inner").exists());
    }

    #[test]
    fn test_load_if_present_absent_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let loaded = load_if_present(&temp_dir.path().join("index.json")).expect("no error");
        assert!(loaded.is_none());
    }

    #[test]
    fn test_serialized_output_is_deterministic() {
        let created = Utc::now();
        let index = BaselineIndex::from_entries(
            vec![entry("b.jpg", 2, None), entry("a.jpg", 1, None)],
            created,
        );
        let first = serde_json::to_string_pretty(&index).expect("serialize");
        let second = serde_json::to_string_pretty(&index).expect("serialize");
        assert_eq!(first, second);
        assert!(first.contains("\"entryCount\": 2"));
    }
}
