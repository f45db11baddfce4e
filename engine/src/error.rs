//! Error types for the detection/import engine.
//!
//! Each subsystem carries its own error enum so that failure vocabularies
//! stay explicit at the boundaries: hashing, atomic copying, document
//! writing, the baseline index, the known-items ledger, collision handling,
//! timestamp extraction, scanning, and the two orchestrators. Per-file
//! errors are recorded in the per-item results, not raised through these
//! enums; only run-aborting conditions surface here.

use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

/// Errors from content hash computation.
#[derive(Debug)]
pub enum HashError {
    /// File does not exist
    FileNotFound { path: PathBuf },

    /// File exists but cannot be read
    PermissionDenied { path: PathBuf, source: io::Error },

    /// The path resolves (via symlinks) outside the allowed root
    SymlinkOutsideRoot {
        path: PathBuf,
        resolved: PathBuf,
        root: PathBuf,
    },

    /// Any other read failure
    Io { path: PathBuf, source: io::Error },
}

impl Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound { path } => {
                write!(f, "File not found: {}", path.display())
            }
            Self::PermissionDenied { path, .. } => {
                write!(f, "Permission denied reading file: {}", path.display())
            }
            Self::SymlinkOutsideRoot { path, resolved, root } => {
                write!(
                    f,
                    "Refusing to hash {}: resolves to {} outside {}",
                    path.display(),
                    resolved.display(),
                    root.display()
                )
            }
            Self::Io { path, .. } => {
                write!(f, "Failed to read file for hashing: {}", path.display())
            }
        }
    }
}

impl Error for HashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PermissionDenied { source, .. } | Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from the atomic file copier.
#[derive(Debug)]
pub enum CopyError {
    /// Source file does not exist
    SourceNotFound { path: PathBuf },

    /// Source exists but is not a regular file
    SourceNotRegularFile { path: PathBuf },

    /// Destination directory could not be created
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Copying bytes to the temporary file failed
    CopyFailed { path: PathBuf, source: io::Error },

    /// Byte-size verification of the temporary copy failed
    VerificationFailed {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Final atomic rename failed
    RenameFailed { path: PathBuf, source: io::Error },
}

impl Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceNotFound { path } => {
                write!(f, "Source file not found: {}", path.display())
            }
            Self::SourceNotRegularFile { path } => {
                write!(f, "Source is not a regular file: {}", path.display())
            }
            Self::DirectoryCreationFailed { path, .. } => {
                write!(f, "Failed to create directory: {}", path.display())
            }
            Self::CopyFailed { path, .. } => {
                write!(f, "Failed to copy file: {}", path.display())
            }
            Self::VerificationFailed { path, expected, actual } => {
                write!(
                    f,
                    "Size verification failed for {}: expected {} bytes, wrote {}",
                    path.display(),
                    expected,
                    actual
                )
            }
            Self::RenameFailed { path, .. } => {
                write!(f, "Failed to rename into place: {}", path.display())
            }
        }
    }
}

impl Error for CopyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DirectoryCreationFailed { source, .. }
            | Self::CopyFailed { source, .. }
            | Self::RenameFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from atomic JSON document writes.
#[derive(Debug)]
pub enum WriteError {
    /// Serialization to JSON failed
    SerializeFailed { path: PathBuf, source: serde_json::Error },

    /// Writing the temporary file failed
    Io { path: PathBuf, source: io::Error },

    /// Written byte count does not match the serialized length
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Final atomic rename failed
    RenameFailed { path: PathBuf, source: io::Error },
}

impl Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerializeFailed { path, .. } => {
                write!(f, "Failed to serialize document for {}", path.display())
            }
            Self::Io { path, .. } => {
                write!(f, "Failed to write document: {}", path.display())
            }
            Self::SizeMismatch { path, expected, actual } => {
                write!(
                    f,
                    "Size verification failed for {}: expected {} bytes, wrote {}",
                    path.display(),
                    expected,
                    actual
                )
            }
            Self::RenameFailed { path, .. } => {
                write!(f, "Failed to rename document into place: {}", path.display())
            }
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SerializeFailed { source, .. } => Some(source),
            Self::Io { source, .. } | Self::RenameFailed { source, .. } => Some(source),
            Self::SizeMismatch { .. } => None,
        }
    }
}

/// Errors from the baseline index.
#[derive(Debug)]
pub enum IndexError {
    /// Index file could not be read
    Io { path: PathBuf, source: io::Error },

    /// Index file is not valid JSON for the expected shape
    Malformed { path: PathBuf, source: serde_json::Error },

    /// Index declares a version outside the supported set
    UnsupportedVersion { path: PathBuf, found: String },

    /// Refusing to write an index outside the library root
    WriteOutsideLibrary { path: PathBuf, root: PathBuf },

    /// Atomic write of the index failed
    Write(WriteError),
}

impl Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, .. } => {
                write!(f, "Failed to read index: {}", path.display())
            }
            Self::Malformed { path, .. } => {
                write!(f, "Malformed index document: {}", path.display())
            }
            Self::UnsupportedVersion { path, found } => {
                write!(
                    f,
                    "Unsupported index version \"{}\" in {}",
                    found,
                    path.display()
                )
            }
            Self::WriteOutsideLibrary { path, root } => {
                write!(
                    f,
                    "Refusing to write index {} outside library {}",
                    path.display(),
                    root.display()
                )
            }
            Self::Write(e) => write!(f, "Index write failed: {}", e),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Malformed { source, .. } => Some(source),
            Self::Write(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WriteError> for IndexError {
    fn from(e: WriteError) -> Self {
        IndexError::Write(e)
    }
}

/// Errors from the known-items ledger.
#[derive(Debug)]
pub enum LedgerError {
    /// Ledger file could not be read
    Io { path: PathBuf, source: io::Error },

    /// Ledger file is not valid JSON for the expected shape
    Malformed { path: PathBuf, source: serde_json::Error },

    /// Atomic write of the ledger failed
    Write(WriteError),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, .. } => {
                write!(f, "Failed to read known-items ledger: {}", path.display())
            }
            Self::Malformed { path, .. } => {
                write!(f, "Malformed known-items ledger: {}", path.display())
            }
            Self::Write(e) => write!(f, "Ledger write failed: {}", e),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Malformed { source, .. } => Some(source),
            Self::Write(e) => Some(e),
        }
    }
}

impl From<WriteError> for LedgerError {
    fn from(e: WriteError) -> Self {
        LedgerError::Write(e)
    }
}

/// Errors from destination collision resolution.
#[derive(Debug)]
pub enum CollisionError {
    /// Destination exists and is a directory; no policy can resolve this
    DestinationIsDirectory { path: PathBuf },

    /// Destination exists and the policy is `error`
    DestinationExists { path: PathBuf },

    /// All numbered rename variants are taken
    MaxRenameAttemptsReached { path: PathBuf, attempts: u32 },

    /// Destination path has no file name component
    InvalidDestination { path: PathBuf },
}

impl Display for CollisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DestinationIsDirectory { path } => {
                write!(f, "Destination is a directory: {}", path.display())
            }
            Self::DestinationExists { path } => {
                write!(f, "Destination already exists: {}", path.display())
            }
            Self::MaxRenameAttemptsReached { path, attempts } => {
                write!(
                    f,
                    "No free name for {} after {} rename attempts",
                    path.display(),
                    attempts
                )
            }
            Self::InvalidDestination { path } => {
                write!(f, "Destination has no file name: {}", path.display())
            }
        }
    }
}

impl Error for CollisionError {}

/// Errors from timestamp extraction.
#[derive(Debug)]
pub enum TimestampError {
    /// Neither embedded metadata nor filesystem attributes are readable
    Inaccessible { path: PathBuf, source: io::Error },
}

impl Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inaccessible { path, .. } => {
                write!(f, "File attributes inaccessible: {}", path.display())
            }
        }
    }
}

impl Error for TimestampError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Inaccessible { source, .. } => Some(source),
        }
    }
}

/// Errors from directory scanning.
#[derive(Debug)]
pub enum ScanError {
    /// Scan root does not exist
    RootNotFound { path: PathBuf },

    /// Scan root is not a directory
    NotADirectory { path: PathBuf },

    /// Reading a directory failed
    ReadDirFailed { path: PathBuf, source: io::Error },
}

impl Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Scan root not found: {}", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Scan root is not a directory: {}", path.display())
            }
            Self::ReadDirFailed { path, .. } => {
                write!(f, "Failed to read directory: {}", path.display())
            }
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReadDirFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Run-aborting errors from the detection orchestrator.
#[derive(Debug)]
pub enum DetectError {
    /// Source path does not exist, is not a directory, or has the wrong type
    SourceInaccessible { path: PathBuf, reason: String },

    /// Scanning the source failed
    ScanFailed(ScanError),

    /// Fallback scan of the library content failed
    LibraryScanFailed(ScanError),

    /// The baseline index exists but could not be used
    Index(IndexError),

    /// The known-items ledger could not be read
    Ledger(LedgerError),

    /// Persisting the detection result or source state failed
    PersistFailed(WriteError),

    /// The run was canceled at a safe point
    Canceled,
}

impl Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceInaccessible { path, reason } => {
                write!(f, "Source inaccessible: {} ({})", path.display(), reason)
            }
            Self::ScanFailed(e) => write!(f, "Source scan failed: {}", e),
            Self::LibraryScanFailed(e) => write!(f, "Library scan failed: {}", e),
            Self::Index(e) => write!(f, "{}", e),
            Self::Ledger(e) => write!(f, "{}", e),
            Self::PersistFailed(e) => write!(f, "Failed to persist detection result: {}", e),
            Self::Canceled => write!(f, "Detection canceled"),
        }
    }
}

impl Error for DetectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ScanFailed(e) | Self::LibraryScanFailed(e) => Some(e),
            Self::Index(e) => Some(e),
            Self::Ledger(e) => Some(e),
            Self::PersistFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IndexError> for DetectError {
    fn from(e: IndexError) -> Self {
        DetectError::Index(e)
    }
}

impl From<LedgerError> for DetectError {
    fn from(e: LedgerError) -> Self {
        DetectError::Ledger(e)
    }
}

/// Run-aborting errors from the import executor.
///
/// Per-item failures (timestamp, mapping, collision, copy) are recorded in
/// the item results and never surface here.
#[derive(Debug)]
pub enum ImportError {
    /// Updating the known-items ledger failed; this risks duplicate-import
    /// detection gaps on future runs, so the whole run is failed
    Ledger(LedgerError),

    /// Persisting the import result failed
    PersistFailed(WriteError),

    /// The run was canceled at a safe point; items completed before the
    /// cancellation keep their effects (no rollback)
    Canceled,
}

impl Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger(e) => write!(f, "{}", e),
            Self::PersistFailed(e) => write!(f, "Failed to persist import result: {}", e),
            Self::Canceled => write!(f, "Import canceled"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ledger(e) => Some(e),
            Self::PersistFailed(e) => Some(e),
            Self::Canceled => None,
        }
    }
}

impl From<LedgerError> for ImportError {
    fn from(e: LedgerError) -> Self {
        ImportError::Ledger(e)
    }
}

/// Errors from hash coverage maintenance.
#[derive(Debug)]
pub enum MaintenanceError {
    /// No index exists to backfill
    NoIndex { path: PathBuf },

    /// The index could not be loaded or written
    Index(IndexError),

    /// The run was canceled at a safe point
    Canceled,
}

impl Display for MaintenanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIndex { path } => {
                write!(f, "No baseline index at {}", path.display())
            }
            Self::Index(e) => write!(f, "{}", e),
            Self::Canceled => write!(f, "Hash backfill canceled"),
        }
    }
}

impl Error for MaintenanceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Index(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IndexError> for MaintenanceError {
    fn from(e: IndexError) -> Self {
        MaintenanceError::Index(e)
    }
}

/// Errors from duplicate reporting.
#[derive(Debug)]
pub enum ReportError {
    /// Duplicate reporting requires an existing index
    NoIndex { path: PathBuf },

    /// The index could not be loaded
    Index(IndexError),
}

impl Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIndex { path } => {
                write!(f, "No baseline index at {}", path.display())
            }
            Self::Index(e) => write!(f, "{}", e),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Index(e) => Some(e),
            Self::NoIndex { .. } => None,
        }
    }
}

impl From<IndexError> for ReportError {
    fn from(e: IndexError) -> Self {
        ReportError::Index(e)
    }
}
