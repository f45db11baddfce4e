//! Import execution.
//!
//! Takes the new candidates of a prior detection result and copies them into
//! the library's Year/Month layout, one file at a time. Per-item failures
//! (unreadable file, collision under the error policy, copy failure) mark
//! that item failed and the run continues. After the item loop the run
//! merges the staged entries into the baseline index, appends the imported
//! items to the known-items ledger, and persists the `ImportResult`.
//!
//! Cancellation is polled between items; a canceled run still performs the
//! post-pass for the items already copied, so their library state is
//! consistent, and the persisted result carries `canceled: true`.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::collision::{resolve_collision_avoiding, CollisionOutcome};
use crate::error::ImportError;
use crate::fs_atomic::{copy_atomically, write_json_atomic};
use crate::hashing::hash_file;
use crate::index::{load_if_present, BaselineIndex, IndexEntry};
use crate::layout::{result_file_name, LibraryLayout};
use crate::ledger;
use crate::mapping::map_destination;
use crate::model::{
    CandidateItemResult, CandidateStatus, DetectionResult, ImportItemResult, ImportItemStatus,
    ImportOptions, ImportResult, ImportSummary, IndexUpdateReason, KnownItem, Source,
    RESULT_VERSION,
};
use crate::progress::{CancellationToken, ProgressSink, ProgressStage, ThrottledProgress};
use crate::scan::relative_path;
use crate::timestamp::extract_timestamp;

/// Baseline index state observed at the start of an import run.
enum IndexState {
    Valid(BaselineIndex),
    Missing,
    Invalid,
}

/// Import the new candidates of `detection` into the library.
///
/// `selected` restricts the run to the given candidate paths; `None` imports
/// every new candidate. Known candidates are never imported, selected or
/// not. Returns the persisted `ImportResult`; only ledger or result
/// persistence failures and cancellation surface as `ImportError`.
pub fn run_import(
    library_root: &Path,
    library_id: Uuid,
    source: &Source,
    detection: &DetectionResult,
    selected: Option<&BTreeSet<std::path::PathBuf>>,
    options: &ImportOptions,
    sink: Option<&dyn ProgressSink>,
    cancel: Option<&CancellationToken>,
) -> Result<ImportResult, ImportError> {
    let layout = LibraryLayout::new(library_root);
    let mut progress = ThrottledProgress::new(sink);

    let mut items: Vec<&CandidateItemResult> = detection
        .candidates
        .iter()
        .filter(|c| c.status == CandidateStatus::New)
        .filter(|c| selected.map(|s| s.contains(&c.path)).unwrap_or(true))
        .collect();
    items.sort_by(|a, b| a.path.cmp(&b.path));
    let total = items.len() as u64;

    // Read the index state once, up front. A missing or unreadable index
    // does not block imports; it only suppresses the index merge.
    let index_state = match load_if_present(&layout.index_path()) {
        Ok(Some(index)) => IndexState::Valid(index),
        Ok(None) => IndexState::Missing,
        Err(e) => {
            warn!(error = %e, "baseline index unreadable, importing without index update");
            IndexState::Invalid
        }
    };

    let mut results: Vec<ImportItemResult> = Vec::with_capacity(items.len());
    let mut staged_entries: Vec<IndexEntry> = Vec::new();
    let mut ledger_additions: Vec<KnownItem> = Vec::new();
    let mut claimed: HashSet<std::path::PathBuf> = HashSet::new();
    let mut bytes_imported: u64 = 0;
    let mut canceled = false;

    for (i, candidate) in items.iter().enumerate() {
        if cancel.map(|t| t.is_canceled()).unwrap_or(false) {
            canceled = true;
            break;
        }
        progress.report(
            ProgressStage::Importing,
            Some(i as u64),
            Some(total),
            Some(candidate.file_name.clone()),
        );

        let item = import_one(
            candidate,
            &layout,
            options,
            &mut claimed,
            &mut staged_entries,
        );
        if item.status == ImportItemStatus::Imported {
            bytes_imported += item.size;
            if !options.dry_run {
                if let Some(dest) = &item.destination_path {
                    ledger_additions.push(KnownItem {
                        path: candidate.path.clone(),
                        imported_at: Utc::now(),
                        destination_path: dest.clone(),
                    });
                }
            }
        }
        results.push(item);
    }

    // Post-pass: index merge first, then the ledger, then the run record.
    let (index_updated, index_update_reason) = if options.dry_run {
        (false, Some(IndexUpdateReason::DryRun))
    } else if staged_entries.is_empty() {
        (false, Some(IndexUpdateReason::NoNewEntries))
    } else {
        match index_state {
            IndexState::Missing => (false, Some(IndexUpdateReason::IndexMissing)),
            IndexState::Invalid => (false, Some(IndexUpdateReason::IndexInvalid)),
            IndexState::Valid(index) => {
                let updated = index.updating(&staged_entries, Utc::now());
                match updated.write(&layout.index_path(), library_root) {
                    Ok(()) => (true, None),
                    Err(e) => {
                        error!(error = %e, "baseline index update failed after import");
                        (false, Some(IndexUpdateReason::UpdateFailed))
                    }
                }
            }
        }
    };

    if !ledger_additions.is_empty() {
        let ledger_path = layout.known_items_path(source.id);
        let tracking = ledger::load_or_empty(&ledger_path, source.id)?;
        let appended = ledger::append(&tracking, ledger_additions, Utc::now());
        ledger::write(&appended, &ledger_path)?;
    }

    let imported = results
        .iter()
        .filter(|r| r.status == ImportItemStatus::Imported)
        .count();
    let skipped = results
        .iter()
        .filter(|r| r.status == ImportItemStatus::Skipped)
        .count();
    let summary = ImportSummary {
        total: results.len(),
        imported,
        skipped,
        failed: results.len() - imported - skipped,
        bytes_imported,
    };

    let imported_at = Utc::now();
    let result = ImportResult {
        version: RESULT_VERSION.to_string(),
        source_id: source.id,
        library_id,
        imported_at,
        options: *options,
        items: results,
        summary,
        index_updated,
        index_update_reason,
        canceled,
    };

    let result_path = layout
        .imports_dir(source.id)
        .join(result_file_name(imported_at));
    write_json_atomic(&result_path, &result).map_err(ImportError::PersistFailed)?;

    info!(
        source = %source.path.display(),
        imported = summary.imported,
        skipped = summary.skipped,
        failed = summary.failed,
        dry_run = options.dry_run,
        canceled,
        "import complete"
    );
    progress.report_now(ProgressStage::Complete, Some(total), Some(total), None);

    if canceled {
        return Err(ImportError::Canceled);
    }
    Ok(result)
}

/// Import a single candidate. Never returns an error: every failure mode
/// becomes a failed or skipped item result.
fn import_one(
    candidate: &CandidateItemResult,
    layout: &LibraryLayout,
    options: &ImportOptions,
    claimed: &mut HashSet<std::path::PathBuf>,
    staged_entries: &mut Vec<IndexEntry>,
) -> ImportItemResult {
    let mut item = ImportItemResult {
        source_path: candidate.path.clone(),
        destination_path: None,
        status: ImportItemStatus::Failed,
        reason: None,
        hash: None,
        size: candidate.size,
        timestamp_source: None,
    };

    let (organizing_time, ts_source) = match extract_timestamp(&candidate.path) {
        Ok(found) => found,
        Err(e) => {
            warn!(path = %candidate.path.display(), error = %e, "item failed");
            item.reason = Some(e.to_string());
            return item;
        }
    };
    item.timestamp_source = Some(ts_source);

    let mapped = map_destination(organizing_time, &candidate.file_name);
    if mapped.used_date_fallback {
        warn!(
            path = %candidate.path.display(),
            "organizing timestamp out of plausible range, using current date"
        );
    }
    let preferred = layout.media_path(&mapped.relative_path);

    let destination = match resolve_collision_avoiding(&preferred, options.collision_policy, claimed)
    {
        Ok(CollisionOutcome::Proceed(dest)) => dest,
        Ok(CollisionOutcome::Skip { reason }) => {
            item.status = ImportItemStatus::Skipped;
            item.reason = Some(reason);
            return item;
        }
        Err(e) => {
            warn!(path = %candidate.path.display(), error = %e, "item failed");
            item.reason = Some(e.to_string());
            return item;
        }
    };
    claimed.insert(destination.clone());

    let destination_rel = match relative_path(layout.root(), &destination) {
        Some(rel) => rel,
        None => {
            item.reason = Some("destination outside library root".to_string());
            return item;
        }
    };
    item.destination_path = Some(destination_rel.clone());

    if options.dry_run {
        item.status = ImportItemStatus::Imported;
        return item;
    }

    if let Err(e) = copy_atomically(&candidate.path, &destination) {
        warn!(path = %candidate.path.display(), error = %e, "item failed");
        item.reason = Some(e.to_string());
        return item;
    }

    // Hash the copy so the index entry gains coverage immediately. A hash
    // failure here degrades the entry, not the item.
    let hash = match hash_file(&destination, layout.root()) {
        Ok(h) => Some(h.to_string()),
        Err(e) => {
            warn!(path = %destination.display(), error = %e, "post-copy hash failed");
            None
        }
    };
    item.hash = hash.clone();

    let mtime = std::fs::metadata(&destination)
        .and_then(|m| m.modified())
        .map(chrono::DateTime::from)
        .unwrap_or(candidate.modification_date);
    staged_entries.push(IndexEntry {
        path: destination_rel,
        size: candidate.size,
        mtime,
        hash,
    });

    item.status = ImportItemStatus::Imported;
    item
}
