//! MediaHub - Command-line interface for the media import engine.
//!
//! This is a simple CLI for testing and manual use of the import engine.
//! It provides argument parsing, progress reporting to stderr, and human
//! summaries of engine results on stdout.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use uuid::Uuid;

use engine::{
    backfill_hashes, duplicate_report, run_detection, run_import,
    model::{CollisionPolicy, ImportOptions, Source, SourceType},
    progress::{ProgressSink, ProgressStage, ProgressUpdate},
    BaselineIndex, DetectionResult, LibraryLayout,
};

/// Extensions considered media when none are given explicitly.
const DEFAULT_MEDIA_TYPES: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "heif", "tiff", "bmp", "webp", "dng", "cr2", "nef",
    "arw", "mp4", "mov", "avi", "mkv", "m4v",
];

/// MediaHub - detect and import media into a content-addressed library
#[derive(Parser, Debug)]
#[command(name = "mediahub")]
#[command(version = "0.1.0")]
#[command(about = "Detect and import media files with duplicate detection")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a source folder and classify candidates against the library
    Detect {
        /// Library root directory
        #[arg(long, value_name = "PATH")]
        library: PathBuf,

        /// Source directory to scan
        #[arg(long, value_name = "PATH")]
        source: PathBuf,

        /// Comma-separated extensions to consider (default: common photo/video types)
        #[arg(long, value_name = "EXTS")]
        media_types: Option<String>,

        /// Consider every file regardless of extension
        #[arg(long, conflicts_with = "media_types")]
        all_types: bool,
    },

    /// Import the new candidates of the latest detection run
    Import {
        /// Library root directory
        #[arg(long, value_name = "PATH")]
        library: PathBuf,

        /// Source directory the detection was run against
        #[arg(long, value_name = "PATH")]
        source: PathBuf,

        /// Collision policy: rename, skip, or error
        #[arg(long, value_name = "POLICY", default_value = "rename")]
        collision: String,

        /// Compute destinations and report without copying anything
        #[arg(long)]
        dry_run: bool,

        /// Import only these source paths (repeatable); default is all new candidates
        #[arg(long = "only", value_name = "PATH")]
        only: Vec<PathBuf>,
    },

    /// Backfill missing content hashes into the baseline index
    BackfillHashes {
        /// Library root directory
        #[arg(long, value_name = "PATH")]
        library: PathBuf,

        /// Maximum number of entries to hash in this run
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Report duplicate content groups in the library
    Dupes {
        /// Library root directory
        #[arg(long, value_name = "PATH")]
        library: PathBuf,
    },
}

/// CLI implementation of ProgressSink for displaying run progress
struct CliProgress {
    verbose: bool,
}

impl ProgressSink for CliProgress {
    fn report(&self, update: &ProgressUpdate) {
        match update.stage {
            ProgressStage::Scanning => eprintln!("Scanning source..."),
            ProgressStage::ScanComplete => {
                if let Some(total) = update.total {
                    eprintln!("Scan complete: {} candidates", total);
                }
            }
            ProgressStage::Comparing => {
                if self.verbose {
                    eprintln!("Comparing against library...");
                }
            }
            ProgressStage::Hashing | ProgressStage::Importing => {
                let label = match update.stage {
                    ProgressStage::Hashing => "Hashing",
                    _ => "Importing",
                };
                match (update.current, update.total, &update.message) {
                    (Some(current), Some(total), Some(msg)) => {
                        eprintln!("{} {}/{}: {}", label, current + 1, total, msg)
                    }
                    (Some(current), Some(total), None) => {
                        eprintln!("{} {}/{}", label, current + 1, total)
                    }
                    _ => eprintln!("{}...", label),
                }
            }
            ProgressStage::Complete => {}
        }
    }
}

/// Parse and validate command-line arguments, then run the selected command
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let progress = CliProgress {
        verbose: args.verbose,
    };

    match &args.command {
        Command::Detect {
            library,
            source,
            media_types,
            all_types,
        } => {
            validate_library(library)?;
            bootstrap_index_if_fresh(library)?;
            let source = build_source(source, media_types.as_deref(), *all_types)?;
            let library_id = stable_id(library);

            let result = run_detection(library, library_id, &source, Some(&progress), None)
                .map_err(|e| format!("Detection failed: {}", e))?;

            println!(
                "Detected {} candidates: {} new, {} known",
                result.summary.total_scanned, result.summary.new_items, result.summary.known_items
            );
            if !result.index_used {
                println!("Note: no baseline index; compared against a full library scan");
            }
            if args.verbose {
                for candidate in &result.candidates {
                    let note = match (&candidate.exclusion_reason, &candidate.duplicate_of_library_path) {
                        (Some(reason), _) => format!(" ({})", reason),
                        (None, Some(path)) => format!(" (duplicate of {})", path),
                        _ => String::new(),
                    };
                    println!(
                        "  {} {}{}",
                        candidate.status,
                        candidate.path.display(),
                        note
                    );
                }
            }
            Ok(())
        }

        Command::Import {
            library,
            source,
            collision,
            dry_run,
            only,
        } => {
            validate_library(library)?;
            let collision_policy = parse_collision_policy(collision)?;
            let source = build_source(source, None, true)?;
            let library_id = stable_id(library);

            let detection = load_latest_detection(library, source.id)?;
            let selected: Option<BTreeSet<PathBuf>> = if only.is_empty() {
                None
            } else {
                Some(only.iter().cloned().collect())
            };

            let options = ImportOptions {
                collision_policy,
                dry_run: *dry_run,
            };
            let result = run_import(
                library,
                library_id,
                &source,
                &detection,
                selected.as_ref(),
                &options,
                Some(&progress),
                None,
            )
            .map_err(|e| format!("Import failed: {}", e))?;

            if *dry_run {
                println!("Dry run: nothing was copied");
            }
            println!(
                "Import summary: {} imported, {} skipped, {} failed ({} bytes)",
                result.summary.imported,
                result.summary.skipped,
                result.summary.failed,
                result.summary.bytes_imported
            );
            for item in &result.items {
                match (&item.destination_path, &item.reason) {
                    (Some(dest), None) => {
                        if args.verbose {
                            println!("  {} -> {}", item.source_path.display(), dest);
                        }
                    }
                    (_, Some(reason)) => {
                        println!("  {} {}: {}", item.status, item.source_path.display(), reason)
                    }
                    _ => {}
                }
            }

            if result.summary.failed > 0 {
                Err("One or more items failed to import".to_string())
            } else {
                Ok(())
            }
        }

        Command::BackfillHashes { library, limit } => {
            validate_library(library)?;
            let report = backfill_hashes(library, *limit, Some(&progress), None)
                .map_err(|e| format!("Hash backfill failed: {}", e))?;

            println!(
                "Backfill: {} selected, {} hashed, {} failed",
                report.selected, report.hashed, report.failed
            );
            println!("Hash coverage: {:.1}%", report.hash_coverage * 100.0);
            Ok(())
        }

        Command::Dupes { library } => {
            validate_library(library)?;
            let report = duplicate_report(library)
                .map_err(|e| format!("Duplicate report failed: {}", e))?;

            if report.groups.is_empty() {
                println!("No duplicate content found");
                return Ok(());
            }
            println!(
                "{} duplicate group(s), {} bytes reclaimable",
                report.groups.len(),
                report.total_potential_savings
            );
            for group in &report.groups {
                println!("  {} ({} bytes reclaimable)", group.hash, group.potential_savings);
                for file in &group.files {
                    println!("    {} ({} bytes)", file.path, file.size);
                }
            }
            Ok(())
        }
    }
}

fn validate_library(library: &Path) -> Result<(), String> {
    if !library.exists() {
        return Err(format!(
            "Library directory does not exist: {}",
            library.display()
        ));
    }
    if !library.is_dir() {
        return Err(format!("Library is not a directory: {}", library.display()));
    }
    Ok(())
}

/// Seed an empty baseline index when the library is brand new (no index and
/// no media content). A library with existing content but no index keeps the
/// full-scan fallback until an index is built deliberately.
fn bootstrap_index_if_fresh(library: &Path) -> Result<(), String> {
    let layout = LibraryLayout::new(library);
    if layout.index_path().exists() {
        return Ok(());
    }
    let has_content = fs::read_dir(library)
        .map_err(|e| format!("Failed to read library {}: {}", library.display(), e))?
        .filter_map(|e| e.ok())
        .any(|e| !e.file_name().to_string_lossy().starts_with('.'));
    if has_content {
        return Ok(());
    }

    BaselineIndex::new_empty(chrono::Utc::now())
        .write(&layout.index_path(), library)
        .map_err(|e| format!("Failed to create baseline index: {}", e))
}

/// Build the source record for a source directory. Source and library ids
/// are derived from canonical paths so repeated runs address the same
/// ledger and state files.
fn build_source(
    path: &Path,
    media_types: Option<&str>,
    all_types: bool,
) -> Result<Source, String> {
    if !path.exists() {
        return Err(format!("Source directory does not exist: {}", path.display()));
    }
    if !path.is_dir() {
        return Err(format!("Source is not a directory: {}", path.display()));
    }

    let media_types = if all_types {
        Vec::new()
    } else {
        match media_types {
            Some(list) => list
                .split(',')
                .map(|t| t.trim().trim_start_matches('.').to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            None => DEFAULT_MEDIA_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    };

    Ok(Source {
        id: stable_id(path),
        source_type: SourceType::Folder,
        path: path.to_path_buf(),
        media_types,
    })
}

/// Deterministic id for a directory, so the same path maps to the same
/// per-source state across runs.
fn stable_id(path: &Path) -> Uuid {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        canonical.to_string_lossy().as_bytes(),
    )
}

fn parse_collision_policy(value: &str) -> Result<CollisionPolicy, String> {
    match value.to_lowercase().as_str() {
        "rename" => Ok(CollisionPolicy::Rename),
        "skip" => Ok(CollisionPolicy::Skip),
        "error" => Ok(CollisionPolicy::Error),
        _ => Err(format!(
            "Invalid collision policy '{}'. Must be 'rename', 'skip', or 'error'",
            value
        )),
    }
}

/// Load the most recent detection result for a source. Result filenames
/// sort chronologically, so the lexicographic maximum is the latest run.
fn load_latest_detection(library: &Path, source_id: Uuid) -> Result<DetectionResult, String> {
    let detections_dir = LibraryLayout::new(library).detections_dir(source_id);
    let entries = fs::read_dir(&detections_dir).map_err(|_| {
        "No detection results for this source; run 'mediahub detect' first".to_string()
    })?;

    let latest = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .max();
    let latest = match latest {
        Some(path) => path,
        None => {
            return Err(
                "No detection results for this source; run 'mediahub detect' first".to_string(),
            )
        }
    };

    let bytes = fs::read(&latest)
        .map_err(|e| format!("Failed to read {}: {}", latest.display(), e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| format!("Malformed detection result {}: {}", latest.display(), e))
}
