//! # MediaHub Engine - Media Import Library
//!
//! A headless detection-and-import engine for content-addressed media
//! libraries. Designed as the foundation for multiple UIs (CLI, GUI,
//! automation).
//!
//! ## Overview
//!
//! The engine scans media sources, classifies candidates against a
//! persisted baseline index and a per-source known-items ledger, and
//! imports new files into a crash-safe `YYYY/MM` library layout. It
//! features:
//! - Content-addressed duplicate detection (SHA-256, path + hash)
//! - Atomic copies and state writes (temp file + rename)
//! - Per-item error isolation within bulk runs
//! - Progress reporting via callbacks (decoupled from UI technology)
//! - Cooperative cancellation at safe points
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use engine::{run_detection, run_import, ImportOptions, Source, SourceType};
//! use uuid::Uuid;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let library = Path::new("/media/library");
//! let library_id = Uuid::new_v4();
//! let source = Source {
//!     id: Uuid::new_v4(),
//!     source_type: SourceType::Folder,
//!     path: PathBuf::from("/media/camera"),
//!     media_types: vec!["jpg".to_string(), "mp4".to_string()],
//! };
//!
//! // Detect: scan the source and classify candidates
//! let detection = run_detection(library, library_id, &source, None, None)?;
//! println!("{} new items", detection.summary.new_items);
//!
//! // Import everything new
//! let result = run_import(
//!     library,
//!     library_id,
//!     &source,
//!     &detection,
//!     None,
//!     &ImportOptions::default(),
//!     None,
//!     None,
//! )?;
//! println!("imported {} files", result.summary.imported);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (Source, DetectionResult, ImportResult)
//! - **error**: Error types and handling
//! - **hashing**: Streaming SHA-256 content hashing with symlink containment
//! - **fs_atomic**: Atomic file copies and JSON state writes
//! - **index**: Baseline index (load, merge, persist)
//! - **ledger**: Per-source known-items ledger
//! - **scan**: Source and library tree enumeration
//! - **collision**: Destination collision policies
//! - **mapping**: Year/Month destination mapping
//! - **timestamp**: Organizing-timestamp extraction (EXIF, filesystem)
//! - **layout**: `.mediahub` control-directory layout
//! - **progress**: Progress callback trait and cancellation token
//! - **detect**: Detection orchestration
//! - **import**: Import execution
//! - **maintenance**: Hash-coverage backfill
//! - **report**: Duplicate reporting

pub mod collision;
pub mod detect;
pub mod error;
pub mod fs_atomic;
pub mod hashing;
pub mod import;
pub mod index;
pub mod layout;
pub mod ledger;
pub mod maintenance;
pub mod mapping;
pub mod model;
pub mod progress;
pub mod report;
pub mod scan;
pub mod timestamp;

// Re-export main types and functions
pub use detect::run_detection;
pub use error::{DetectError, ImportError, MaintenanceError, ReportError};
pub use import::run_import;
pub use index::{BaselineIndex, IndexEntry};
pub use layout::LibraryLayout;
pub use maintenance::{backfill_hashes, BackfillReport};
pub use model::{
    CollisionPolicy, DetectionResult, ImportOptions, ImportResult, Source, SourceType,
};
pub use progress::{CancellationToken, ProgressSink, ProgressStage, ProgressUpdate};
pub use report::{duplicate_report, DuplicateReport};
