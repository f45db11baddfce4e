//! Duplicate reporting.
//!
//! Read-only fold over the baseline index: entries sharing a content hash
//! form a duplicate group. Requires an existing index; building hash
//! coverage first (imports or a backfill run) is what makes the report
//! meaningful.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ReportError;
use crate::index::{load_if_present, IndexEntry};
use crate::layout::LibraryLayout;

/// One file within a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateFile {
    /// Library-relative path
    pub path: String,
    pub size: u64,
}

/// A set of index entries sharing one content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub hash: String,

    /// Member files, sorted by path
    pub files: Vec<DuplicateFile>,

    /// Combined size of all members
    pub total_size: u64,

    /// Bytes reclaimable by keeping a single copy
    pub potential_savings: u64,
}

/// Summary of duplicate content across the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    /// Groups with at least two members, sorted by hash
    pub groups: Vec<DuplicateGroup>,

    /// Total reclaimable bytes across all groups
    pub total_potential_savings: u64,
}

/// Build the duplicate report for the library at `library_root`.
pub fn duplicate_report(library_root: &Path) -> Result<DuplicateReport, ReportError> {
    let layout = LibraryLayout::new(library_root);
    let index = match load_if_present(&layout.index_path())? {
        Some(index) => index,
        None => {
            return Err(ReportError::NoIndex {
                path: layout.index_path(),
            });
        }
    };

    let mut by_hash: BTreeMap<String, Vec<&IndexEntry>> = BTreeMap::new();
    for entry in &index.entries {
        if let Some(hash) = &entry.hash {
            by_hash.entry(hash.clone()).or_default().push(entry);
        }
    }

    let mut groups = Vec::new();
    for (hash, mut members) in by_hash {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| a.path.cmp(&b.path));

        let files: Vec<DuplicateFile> = members
            .iter()
            .map(|e| DuplicateFile {
                path: e.path.clone(),
                size: e.size,
            })
            .collect();
        let total_size: u64 = files.iter().map(|f| f.size).sum();
        let potential_savings = total_size - files[0].size;

        groups.push(DuplicateGroup {
            hash,
            files,
            total_size,
            potential_savings,
        });
    }

    let total_potential_savings = groups.iter().map(|g| g.potential_savings).sum();
    Ok(DuplicateReport {
        groups,
        total_potential_savings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BaselineIndex;
    use chrono::Utc;

    fn entry(path: &str, size: u64, hash: Option<&str>) -> IndexEntry {
        IndexEntry {
            path: path.to_string(),
            size,
            mtime: Utc::now(),
            hash: hash.map(|h| h.to_string()),
        }
    }

    fn seed_index(library: &Path, entries: Vec<IndexEntry>) {
        BaselineIndex::from_entries(entries, Utc::now())
            .write(&LibraryLayout::new(library).index_path(), library)
            .expect("Failed to write index");
    }

    #[test]
    fn test_groups_require_two_members() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        seed_index(
            library.path(),
            vec![
                entry("a.jpg", 10, Some("sha256:aa")),
                entry("b.jpg", 10, Some("sha256:aa")),
                entry("c.jpg", 7, Some("sha256:cc")),
                entry("d.jpg", 4, None),
            ],
        );

        let report = duplicate_report(library.path()).expect("Failed to report");
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].hash, "sha256:aa");
        assert_eq!(report.groups[0].files.len(), 2);
    }

    #[test]
    fn test_savings_keep_one_representative_copy() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        seed_index(
            library.path(),
            vec![
                entry("a.jpg", 10, Some("sha256:aa")),
                entry("b.jpg", 10, Some("sha256:aa")),
                entry("c.jpg", 10, Some("sha256:aa")),
            ],
        );

        let report = duplicate_report(library.path()).expect("Failed to report");
        assert_eq!(report.groups[0].total_size, 30);
        assert_eq!(report.groups[0].potential_savings, 20);
        assert_eq!(report.total_potential_savings, 20);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        seed_index(
            library.path(),
            vec![
                entry("z.jpg", 1, Some("sha256:bb")),
                entry("a.jpg", 1, Some("sha256:bb")),
                entry("y.jpg", 2, Some("sha256:aa")),
                entry("b.jpg", 2, Some("sha256:aa")),
            ],
        );

        let report = duplicate_report(library.path()).expect("Failed to report");
        let hashes: Vec<_> = report.groups.iter().map(|g| g.hash.as_str()).collect();
        assert_eq!(hashes, vec!["sha256:aa", "sha256:bb"]);
        let paths: Vec<_> = report.groups[0].files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["b.jpg", "y.jpg"]);
    }

    #[test]
    fn test_no_index_is_a_typed_error() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        let result = duplicate_report(library.path());
        assert!(matches!(result, Err(ReportError::NoIndex { .. })));
    }

    #[test]
    fn test_unhashed_entries_are_ignored() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        seed_index(
            library.path(),
            vec![entry("a.jpg", 1, None), entry("b.jpg", 1, None)],
        );

        let report = duplicate_report(library.path()).expect("Failed to report");
        assert!(report.groups.is_empty());
        assert_eq!(report.total_potential_savings, 0);
    }
}
