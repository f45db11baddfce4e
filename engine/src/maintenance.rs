//! Hash-coverage maintenance.
//!
//! Retrofits content hashes into an existing baseline index in bounded
//! batches, in three explicitly separated phases:
//!
//! 1. `select_candidates` — read-only; picks unhashed entries whose backing
//!    file still exists, sorted by path, truncated to an optional limit.
//! 2. `compute_missing_hashes` — hashes the selection into an in-memory
//!    map; per-file failures are counted, not fatal.
//! 3. `apply_and_write` — reloads the index fresh, fills hashes only into
//!    entries still lacking one, and writes only if something changed.
//!
//! The fresh reload in phase 3 keeps a slow hashing pass from clobbering
//! index updates made by an import run in the meantime.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::MaintenanceError;
use crate::hashing::hash_file;
use crate::index::{load_if_present, BaselineIndex};
use crate::layout::LibraryLayout;
use crate::progress::{CancellationToken, ProgressSink, ProgressStage, ThrottledProgress};

/// Outcome of one backfill run.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillReport {
    /// Entries selected for hashing
    pub selected: usize,

    /// Hashes successfully computed
    pub hashed: usize,

    /// Per-file hash failures (missing, unreadable, symlink escape)
    pub failed: usize,

    /// Whether the index was rewritten
    pub index_updated: bool,

    /// Hash coverage after the run
    pub hash_coverage: f64,
}

/// Backfill up to `limit` missing hashes into the library's baseline index.
pub fn backfill_hashes(
    library_root: &Path,
    limit: Option<usize>,
    sink: Option<&dyn ProgressSink>,
    cancel: Option<&CancellationToken>,
) -> Result<BackfillReport, MaintenanceError> {
    let layout = LibraryLayout::new(library_root);
    let mut progress = ThrottledProgress::new(sink);

    let index = load_index(&layout)?;
    let candidates = select_candidates(&index, &layout, limit);
    let total = candidates.len() as u64;

    let (computed, failed) =
        compute_missing_hashes(&candidates, &layout, &mut progress, cancel)?;
    let hashed = computed.len();

    let (index_updated, coverage) = apply_and_write(&layout, library_root, &computed)?;

    info!(
        library = %library_root.display(),
        selected = candidates.len(),
        hashed,
        failed,
        coverage,
        "hash backfill complete"
    );
    progress.report_now(ProgressStage::Complete, Some(total), Some(total), None);

    Ok(BackfillReport {
        selected: candidates.len(),
        hashed,
        failed,
        index_updated,
        hash_coverage: coverage,
    })
}

fn load_index(layout: &LibraryLayout) -> Result<BaselineIndex, MaintenanceError> {
    match load_if_present(&layout.index_path())? {
        Some(index) => Ok(index),
        None => Err(MaintenanceError::NoIndex {
            path: layout.index_path(),
        }),
    }
}

/// Phase 1: unhashed entries whose backing file still exists, sorted by
/// path, truncated to `limit`. Selection does not depend on hashing
/// outcomes, so repeated runs walk the remaining entries in a stable order.
fn select_candidates(
    index: &BaselineIndex,
    layout: &LibraryLayout,
    limit: Option<usize>,
) -> Vec<String> {
    let mut paths: Vec<String> = index
        .entries
        .iter()
        .filter(|e| e.hash.is_none())
        .filter(|e| layout.media_path(&e.path).is_file())
        .map(|e| e.path.clone())
        .collect();
    paths.sort();
    if let Some(limit) = limit {
        paths.truncate(limit);
    }
    paths
}

/// Phase 2: hash each selected path into a map. Per-file failures are
/// logged and counted; cancellation is honored between files.
fn compute_missing_hashes(
    candidates: &[String],
    layout: &LibraryLayout,
    progress: &mut ThrottledProgress<'_>,
    cancel: Option<&CancellationToken>,
) -> Result<(BTreeMap<String, String>, usize), MaintenanceError> {
    let total = candidates.len() as u64;
    let mut computed = BTreeMap::new();
    let mut failed = 0usize;

    for (i, rel) in candidates.iter().enumerate() {
        if cancel.map(|t| t.is_canceled()).unwrap_or(false) {
            return Err(MaintenanceError::Canceled);
        }
        progress.report(
            ProgressStage::Hashing,
            Some(i as u64),
            Some(total),
            Some(rel.clone()),
        );

        match hash_file(&layout.media_path(rel), layout.root()) {
            Ok(hash) => {
                computed.insert(rel.clone(), hash.to_string());
            }
            Err(e) => {
                warn!(path = %rel, error = %e, "hash backfill failed for entry");
                failed += 1;
            }
        }
    }

    Ok((computed, failed))
}

/// Phase 3: reload the index, fill computed hashes only into entries still
/// lacking one, write only when at least one entry changed. Returns whether
/// a write happened and the resulting coverage.
fn apply_and_write(
    layout: &LibraryLayout,
    library_root: &Path,
    computed: &BTreeMap<String, String>,
) -> Result<(bool, f64), MaintenanceError> {
    let index = load_index(layout)?;

    let mut changed = Vec::new();
    for entry in &index.entries {
        if entry.hash.is_none() {
            if let Some(hash) = computed.get(&entry.path) {
                let mut updated = entry.clone();
                updated.hash = Some(hash.clone());
                changed.push(updated);
            }
        }
    }

    if changed.is_empty() {
        return Ok((false, index.hash_coverage()));
    }

    let updated = index.updating(&changed, Utc::now());
    let coverage = updated.hash_coverage();
    updated.write(&layout.index_path(), library_root)?;
    Ok((true, coverage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use std::fs;

    fn write(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dirs");
        }
        fs::write(path, bytes).expect("Failed to write file");
    }

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
    fn test_backfill_fills_missing_hashes_and_bumps_version() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        write(&library.path().join("2020").join("06").join("a.txt"), b"hello");
        seed_index(library.path(), vec![entry("2020/06/a.txt", 5, None)]);

        let report =
            backfill_hashes(library.path(), None, None, None).expect("Failed to backfill");
        assert_eq!(report.hashed, 1);
        assert_eq!(report.failed, 0);
        assert!(report.index_updated);
        assert_eq!(report.hash_coverage, 1.0);

        let layout = LibraryLayout::new(library.path());
        let index = load_if_present(&layout.index_path())
            .expect("Failed to load")
            .expect("index present");
        assert_eq!(index.version, crate::index::INDEX_VERSION_HASHED);
        assert_eq!(
            index.entries[0].hash.as_deref(),
            Some("sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
    }

    #[test]
    fn test_limit_bounds_the_batch() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        write(&library.path().join("a.txt"), b"a");
        write(&library.path().join("b.txt"), b"b");
        write(&library.path().join("c.txt"), b"c");
        seed_index(
            library.path(),
            vec![
                entry("a.txt", 1, None),
                entry("b.txt", 1, None),
                entry("c.txt", 1, None),
            ],
        );

        let report =
            backfill_hashes(library.path(), Some(2), None, None).expect("Failed to backfill");
        assert_eq!(report.selected, 2);
        assert_eq!(report.hashed, 2);

        // Selection is path-sorted, so a second limited run picks up c.txt.
        let report =
            backfill_hashes(library.path(), Some(2), None, None).expect("Failed to backfill");
        assert_eq!(report.selected, 1);
        assert_eq!(report.hash_coverage, 1.0);
    }

    #[test]
    fn test_existing_hashes_are_never_overwritten() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        write(&library.path().join("a.txt"), b"hello");
        seed_index(
            library.path(),
            vec![entry("a.txt", 5, Some("sha256:feed"))],
        );

        let report =
            backfill_hashes(library.path(), None, None, None).expect("Failed to backfill");
        assert_eq!(report.selected, 0);
        assert!(!report.index_updated);

        let layout = LibraryLayout::new(library.path());
        let index = load_if_present(&layout.index_path())
            .expect("Failed to load")
            .expect("index present");
        assert_eq!(index.entries[0].hash.as_deref(), Some("sha256:feed"));
    }

    #[test]
    fn test_missing_backing_file_is_not_selected() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        seed_index(library.path(), vec![entry("gone.txt", 4, None)]);

        let report =
            backfill_hashes(library.path(), None, None, None).expect("Failed to backfill");
        assert_eq!(report.selected, 0);
        assert_eq!(report.failed, 0);
        assert!(!report.index_updated);
    }

    #[test]
    fn test_no_index_is_a_typed_error() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        let result = backfill_hashes(library.path(), None, None, None);
        assert!(matches!(result, Err(MaintenanceError::NoIndex { .. })));
    }

    #[test]
    fn test_canceled_run_leaves_index_untouched() {
        let library = tempfile::tempdir().expect("Failed to create temp dir");
        write(&library.path().join("a.txt"), b"a");
        seed_index(library.path(), vec![entry("a.txt", 1, None)]);

        let token = CancellationToken::new();
        token.cancel();
        let result = backfill_hashes(library.path(), None, None, Some(&token));
        assert!(matches!(result, Err(MaintenanceError::Canceled)));

        let layout = LibraryLayout::new(library.path());
        let index = load_if_present(&layout.index_path())
            .expect("Failed to load")
            .expect("index present");
        assert!(index.entries[0].hash.is_none());
    }
}
