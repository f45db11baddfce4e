//! Core data model for the detection/import pipeline.
//!
//! This module defines the types that cross subsystem boundaries:
//! - Source: the external folder being detected against / imported from
//! - CandidateMediaItem: a file found by a source scan, not yet classified
//! - DetectionResult / ImportResult: immutable, persisted run records
//! - KnownItemsTracking: the append-only per-source ledger
//!
//! All persisted types serialize as camelCase JSON with enum values in
//! snake_case, and round-trip losslessly.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document version written into detection and import results.
pub const RESULT_VERSION: &str = "1.0";

/// A source of media files, supplied by the library-management layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Stable identifier for this source
    pub id: Uuid,

    /// Source kind; only folder sources are supported
    #[serde(rename = "type")]
    pub source_type: SourceType,

    /// Absolute path of the source root
    pub path: PathBuf,

    /// Lower-case file extensions to consider; empty means all files
    pub media_types: Vec<String>,
}

/// Supported source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Folder,
}

/// A file found during a source scan. Ephemeral: produced by scanning,
/// consumed within a single detection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMediaItem {
    /// Absolute path of the file
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Filesystem modification time
    pub modification_date: DateTime<Utc>,

    /// File name component, lossily decoded
    pub file_name: String,
}

/// Classification of a candidate after detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    New,
    Known,
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateStatus::New => write!(f, "new"),
            CandidateStatus::Known => write!(f, "known"),
        }
    }
}

/// Path-based reason a candidate is already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The candidate's source-relative path matches a library index entry
    AlreadyInLibrary,
    /// The candidate's path appears in the known-items ledger
    PreviouslyImported,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::AlreadyInLibrary => write!(f, "already_in_library"),
            ExclusionReason::PreviouslyImported => write!(f, "previously_imported"),
        }
    }
}

/// Per-candidate outcome within a detection result.
///
/// A known candidate carries either a path-based `exclusion_reason` or the
/// hash-based duplicate fields, never both: path-based classification takes
/// precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItemResult {
    /// Absolute source path of the candidate
    pub path: PathBuf,

    /// File name component
    pub file_name: String,

    /// File size in bytes
    pub size: u64,

    /// Filesystem modification time
    pub modification_date: DateTime<Utc>,

    /// New or known
    pub status: CandidateStatus,

    /// Path-based reason, if the candidate is known by path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusion_reason: Option<ExclusionReason>,

    /// Content hash shared with a library file, if known by hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of_hash: Option<String>,

    /// Representative library path carrying that hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of_library_path: Option<String>,

    /// Always "content_hash" when the hash fields are set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_reason: Option<String>,
}

/// Aggregate counts for a detection run.
///
/// Invariant: `total_scanned == new_items + known_items` and equals the
/// number of candidate entries in the result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub total_scanned: usize,
    pub new_items: usize,
    pub known_items: usize,
}

/// Snapshot of the index state a detection run was performed against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub version: String,
    pub entry_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Immutable, persisted record of one detection run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub version: String,
    pub source_id: Uuid,
    pub library_id: Uuid,
    pub detected_at: DateTime<Utc>,

    /// Per-candidate outcomes in lexicographic path order
    pub candidates: Vec<CandidateItemResult>,
    pub summary: DetectionSummary,

    /// Whether the baseline index was available and used
    pub index_used: bool,

    /// Why the index was not used, when it wasn't
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_fallback_reason: Option<String>,

    /// Metadata of the index used, when one was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_metadata: Option<IndexMetadata>,

    /// Fraction of index entries carrying a content hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_coverage: Option<f64>,
}

/// How to resolve a destination that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Append " (1)", " (2)", ... before the extension
    Rename,
    /// Skip the item, recording a reason
    Skip,
    /// Fail the item
    Error,
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionPolicy::Rename => write!(f, "rename"),
            CollisionPolicy::Skip => write!(f, "skip"),
            CollisionPolicy::Error => write!(f, "error"),
        }
    }
}

/// Options controlling one import run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    pub collision_policy: CollisionPolicy,

    /// Compute destinations and report outcomes without touching the
    /// filesystem
    pub dry_run: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            collision_policy: CollisionPolicy::Rename,
            dry_run: false,
        }
    }
}

/// Final status of one item within an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportItemStatus {
    Imported,
    Skipped,
    Failed,
}

impl std::fmt::Display for ImportItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportItemStatus::Imported => write!(f, "imported"),
            ImportItemStatus::Skipped => write!(f, "skipped"),
            ImportItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Where an item's organizing timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Embedded capture-time metadata (EXIF DateTimeOriginal)
    Embedded,
    /// Filesystem modification time
    Filesystem,
}

/// Per-item outcome within an import result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportItemResult {
    /// Absolute source path of the item
    pub source_path: PathBuf,

    /// Library-relative destination, when one was computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,

    pub status: ImportItemStatus,

    /// Human-readable reason for skipped/failed items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Content hash of the imported copy, when computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// File size in bytes
    pub size: u64,

    /// Provenance of the timestamp used for destination mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_source: Option<TimestampSource>,
}

/// Aggregate counts for an import run.
///
/// Invariant: `total == imported + skipped + failed` and equals the number
/// of item entries in the result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_imported: u64,
}

/// Why the baseline index was not rewritten at the end of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexUpdateReason {
    IndexMissing,
    IndexInvalid,
    DryRun,
    NoNewEntries,
    UpdateFailed,
}

impl std::fmt::Display for IndexUpdateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexUpdateReason::IndexMissing => write!(f, "index_missing"),
            IndexUpdateReason::IndexInvalid => write!(f, "index_invalid"),
            IndexUpdateReason::DryRun => write!(f, "dry_run"),
            IndexUpdateReason::NoNewEntries => write!(f, "no_new_entries"),
            IndexUpdateReason::UpdateFailed => write!(f, "update_failed"),
        }
    }
}

/// Immutable, persisted record of one import run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub version: String,
    pub source_id: Uuid,
    pub library_id: Uuid,
    pub imported_at: DateTime<Utc>,
    pub options: ImportOptions,

    /// Per-item outcomes in lexicographic source-path order
    pub items: Vec<ImportItemResult>,
    pub summary: ImportSummary,

    /// Whether the baseline index was merged and rewritten
    pub index_updated: bool,

    /// Why it wasn't, when it wasn't
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_update_reason: Option<IndexUpdateReason>,

    /// Whether the run was stopped by cancellation before processing all
    /// selected items; completed items keep their effects
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub canceled: bool,
}

/// One previously imported source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnownItem {
    /// Absolute source path at import time
    pub path: PathBuf,

    pub imported_at: DateTime<Utc>,

    /// Library-relative destination it was imported to
    pub destination_path: String,
}

/// Append-only per-source record of previously imported source paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnownItemsTracking {
    pub source_id: Uuid,
    pub items: Vec<KnownItem>,
    pub last_updated: DateTime<Utc>,
}

/// Core-owned per-source state stamp, updated after each detection run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceState {
    pub last_detected_at: DateTime<Utc>,
}
