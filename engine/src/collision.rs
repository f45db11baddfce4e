//! Destination collision handling.
//!
//! State-free policy resolution over a computed destination path. Directory
//! collisions are an error under every policy; file collisions resolve per
//! the run's `CollisionPolicy`. A claimed-set-aware variant lets a caller
//! compute many destinations up front without re-probing the filesystem
//! between items.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::CollisionError;
use crate::model::CollisionPolicy;

/// Upper bound on numbered rename attempts.
pub const MAX_RENAME_ATTEMPTS: u32 = 1000;

/// What exists at a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// Nothing exists at the destination
    None,
    /// A file exists at the destination
    File,
    /// A directory exists at the destination
    Directory,
}

/// Resolution of a collision check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionOutcome {
    /// Write to this path (possibly a renamed variant of the original)
    Proceed(PathBuf),
    /// Do not write; the reason is recorded on the item
    Skip { reason: String },
}

/// Check what currently exists at a destination.
pub fn detect_collision(destination: &Path) -> Collision {
    match std::fs::symlink_metadata(destination) {
        Ok(m) if m.is_dir() => Collision::Directory,
        Ok(_) => Collision::File,
        Err(_) => Collision::None,
    }
}

/// Resolve a destination collision per policy, probing the filesystem only.
pub fn resolve_collision(
    destination: &Path,
    policy: CollisionPolicy,
) -> Result<CollisionOutcome, CollisionError> {
    resolve_collision_avoiding(destination, policy, &HashSet::new())
}

/// Resolve a destination collision, additionally avoiding a caller-supplied
/// set of already-claimed destination paths.
///
/// The claimed set makes resolution deterministic when several destinations
/// are computed in one pass (including dry runs, where nothing is written
/// between items).
pub fn resolve_collision_avoiding(
    destination: &Path,
    policy: CollisionPolicy,
    claimed: &HashSet<PathBuf>,
) -> Result<CollisionOutcome, CollisionError> {
    if destination.file_name().is_none() {
        return Err(CollisionError::InvalidDestination {
            path: destination.to_path_buf(),
        });
    }

    match detect_collision(destination) {
        Collision::Directory => {
            return Err(CollisionError::DestinationIsDirectory {
                path: destination.to_path_buf(),
            });
        }
        Collision::File => {}
        Collision::None => {
            if !claimed.contains(destination) {
                return Ok(CollisionOutcome::Proceed(destination.to_path_buf()));
            }
        }
    }

    match policy {
        CollisionPolicy::Rename => {
            for attempt in 1..=MAX_RENAME_ATTEMPTS {
                let candidate = numbered_variant(destination, attempt);
                if detect_collision(&candidate) == Collision::None && !claimed.contains(&candidate)
                {
                    return Ok(CollisionOutcome::Proceed(candidate));
                }
            }
            Err(CollisionError::MaxRenameAttemptsReached {
                path: destination.to_path_buf(),
                attempts: MAX_RENAME_ATTEMPTS,
            })
        }
        CollisionPolicy::Skip => Ok(CollisionOutcome::Skip {
            reason: format!("destination already exists: {}", destination.display()),
        }),
        CollisionPolicy::Error => Err(CollisionError::DestinationExists {
            path: destination.to_path_buf(),
        }),
    }
}

/// `photo.jpg` with attempt 2 becomes `photo (2).jpg`; the suffix goes
/// before the extension.
fn numbered_variant(destination: &Path, attempt: u32) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match destination.extension() {
        Some(ext) => format!("{} ({}).{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{} ({})", stem, attempt),
    };
    destination.with_file_name(name)
}
