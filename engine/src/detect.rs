//! Detection orchestration.
//!
//! One detection run: validate the source, scan it, load the baseline index
//! (or fall back to a full library scan), load the known-items ledger,
//! classify every candidate by path and then by content hash, persist the
//! `DetectionResult`, and stamp the source's last-detection time.
//!
//! Classification precedence is path-known > hash-known > new; when both a
//! path and a hash match, the path-based reason is kept. Per-candidate hash
//! failures are non-fatal and leave the candidate classified by path only.
//! Cancellation is polled after scanning and between hash computations.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DetectError;
use crate::fs_atomic::write_json_atomic;
use crate::hashing::hash_file;
use crate::index::{load_if_present, BaselineIndex};
use crate::layout::{result_file_name, LibraryLayout};
use crate::ledger;
use crate::model::{
    CandidateItemResult, CandidateMediaItem, CandidateStatus, DetectionResult, DetectionSummary,
    ExclusionReason, IndexMetadata, Source, SourceState, SourceType, RESULT_VERSION,
};
use crate::progress::{CancellationToken, ProgressSink, ProgressStage, ThrottledProgress};
use crate::scan::{relative_path, scan_library_paths, scan_source};

/// Library state a detection run compares against: either a valid index or
/// the relative path set of a full library scan.
enum LibraryView {
    Indexed(BaselineIndex),
    PathsOnly(BTreeSet<String>),
}

/// Run one detection of `source` against the library at `library_root`.
///
/// Returns the persisted `DetectionResult`. Fatal conditions (inaccessible
/// source, scan failure, malformed index, unreadable ledger, persistence
/// failure, cancellation) surface as `DetectError`.
pub fn run_detection(
    library_root: &Path,
    library_id: Uuid,
    source: &Source,
    sink: Option<&dyn ProgressSink>,
    cancel: Option<&CancellationToken>,
) -> Result<DetectionResult, DetectError> {
    validate_source(source)?;

    let layout = LibraryLayout::new(library_root);
    let mut progress = ThrottledProgress::new(sink);
    progress.report(ProgressStage::Scanning, None, None, None);

    let candidates =
        scan_source(&source.path, &source.media_types).map_err(DetectError::ScanFailed)?;
    let total = candidates.len() as u64;
    progress.report_now(ProgressStage::ScanComplete, None, Some(total), None);
    check_canceled(cancel)?;

    let view = match load_if_present(&layout.index_path())? {
        Some(index) => LibraryView::Indexed(index),
        None => {
            debug!(library = %library_root.display(), "no baseline index, scanning library");
            let paths =
                scan_library_paths(library_root).map_err(DetectError::LibraryScanFailed)?;
            LibraryView::PathsOnly(paths)
        }
    };

    let tracking = ledger::load_or_empty(&layout.known_items_path(source.id), source.id)?;
    let known_source_paths: BTreeSet<_> =
        tracking.items.iter().map(|i| i.path.clone()).collect();

    progress.report(ProgressStage::Comparing, Some(0), Some(total), None);

    // Path pass: relative path against the library, absolute path against
    // the ledger.
    let library_paths = match &view {
        LibraryView::Indexed(index) => index.path_set(),
        LibraryView::PathsOnly(paths) => paths.clone(),
    };
    let mut classified: Vec<(CandidateMediaItem, Option<ExclusionReason>)> = candidates
        .into_iter()
        .map(|candidate| {
            let reason = if known_source_paths.contains(&candidate.path) {
                Some(ExclusionReason::PreviouslyImported)
            } else if relative_path(&source.path, &candidate.path)
                .map(|rel| library_paths.contains(&rel))
                .unwrap_or(false)
            {
                Some(ExclusionReason::AlreadyInLibrary)
            } else {
                None
            };
            (candidate, reason)
        })
        .collect();

    // Hash pass: only candidates still unresolved, only when the index
    // carries hashes. Per-file failures degrade to path-only classification.
    let mut results = Vec::with_capacity(classified.len());
    let (hash_to_path, indexed) = match &view {
        LibraryView::Indexed(index) => (index.hash_to_any_path(), true),
        LibraryView::PathsOnly(_) => (Default::default(), false),
    };
    let hashing_enabled = indexed && !hash_to_path.is_empty();

    let mut hashed = 0u64;
    for (candidate, path_reason) in classified.drain(..) {
        let mut item = CandidateItemResult {
            path: candidate.path.clone(),
            file_name: candidate.file_name.clone(),
            size: candidate.size,
            modification_date: candidate.modification_date,
            status: CandidateStatus::New,
            exclusion_reason: None,
            duplicate_of_hash: None,
            duplicate_of_library_path: None,
            duplicate_reason: None,
        };

        if let Some(reason) = path_reason {
            item.status = CandidateStatus::Known;
            item.exclusion_reason = Some(reason);
        } else if hashing_enabled {
            check_canceled(cancel)?;
            hashed += 1;
            progress.report(
                ProgressStage::Hashing,
                Some(hashed),
                Some(total),
                Some(candidate.file_name.clone()),
            );

            match hash_file(&candidate.path, &source.path) {
                Ok(hash) => {
                    let hash = hash.to_string();
                    if let Some(library_path) = hash_to_path.get(&hash) {
                        item.status = CandidateStatus::Known;
                        item.duplicate_of_hash = Some(hash);
                        item.duplicate_of_library_path = Some(library_path.clone());
                        item.duplicate_reason = Some("content_hash".to_string());
                    }
                }
                Err(e) => {
                    warn!(path = %candidate.path.display(), error = %e,
                        "hash computation failed, keeping path-only classification");
                }
            }
        }

        results.push(item);
    }

    let new_items = results
        .iter()
        .filter(|r| r.status == CandidateStatus::New)
        .count();
    let summary = DetectionSummary {
        total_scanned: results.len(),
        new_items,
        known_items: results.len() - new_items,
    };

    let (index_metadata, hash_coverage) = match &view {
        LibraryView::Indexed(index) => (
            Some(IndexMetadata {
                version: index.version.clone(),
                entry_count: index.entry_count,
                last_updated: index.last_updated,
            }),
            Some(index.hash_coverage()),
        ),
        LibraryView::PathsOnly(_) => (None, None),
    };

    let detected_at = Utc::now();
    let result = DetectionResult {
        version: RESULT_VERSION.to_string(),
        source_id: source.id,
        library_id,
        detected_at,
        candidates: results,
        summary,
        index_used: indexed,
        index_fallback_reason: if indexed {
            None
        } else {
            Some("index_missing".to_string())
        },
        index_metadata,
        hash_coverage,
    };

    let result_path = layout
        .detections_dir(source.id)
        .join(result_file_name(detected_at));
    write_json_atomic(&result_path, &result).map_err(DetectError::PersistFailed)?;

    let state = SourceState {
        last_detected_at: detected_at,
    };
    write_json_atomic(&layout.source_state_path(source.id), &state)
        .map_err(DetectError::PersistFailed)?;

    info!(
        source = %source.path.display(),
        total = summary.total_scanned,
        new = summary.new_items,
        known = summary.known_items,
        "detection complete"
    );
    progress.report_now(
        ProgressStage::Complete,
        Some(total),
        Some(total),
        None,
    );

    Ok(result)
}

fn validate_source(source: &Source) -> Result<(), DetectError> {
    if source.source_type != SourceType::Folder {
        return Err(DetectError::SourceInaccessible {
            path: source.path.clone(),
            reason: "only folder sources are supported".to_string(),
        });
    }
    match std::fs::metadata(&source.path) {
        Ok(m) if m.is_dir() => Ok(()),
        Ok(_) => Err(DetectError::SourceInaccessible {
            path: source.path.clone(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(DetectError::SourceInaccessible {
            path: source.path.clone(),
            reason: e.to_string(),
        }),
    }
}

fn check_canceled(cancel: Option<&CancellationToken>) -> Result<(), DetectError> {
    match cancel {
        Some(token) if token.is_canceled() => Err(DetectError::Canceled),
        _ => Ok(()),
    }
}
