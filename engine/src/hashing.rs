//! Content hashing.
//!
//! Media files and library copies are identified by a streaming SHA-256
//! digest, formatted as `"sha256:<hex>"`. Hashing resolves symlinks first
//! and refuses to read anything that resolves outside the allowed root, so
//! a symlink planted in a source cannot pull external content into the
//! pipeline.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::HashError;

/// Algorithm prefix carried by every content hash this engine produces.
pub const HASH_ALGORITHM: &str = "sha256";

/// Read buffer size for streaming digests; memory use stays O(1)
/// regardless of file size.
const CHUNK_SIZE: usize = 65536;

/// A computed content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash {
    hex: String,
}

impl ContentHash {
    /// Hex digest without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl std::fmt::Display for ContentHash {
    /// Formats as `"sha256:<hex>"`, the form stored in index entries.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", HASH_ALGORITHM, self.hex)
    }
}

/// Compute the content hash of a file, constrained to `allowed_root`.
///
/// The path is fully resolved (following symlinks) before reading; if the
/// resolved path is not `allowed_root` itself or nested under it, the
/// computation fails with `SymlinkOutsideRoot` and the target is never read.
pub fn hash_file(path: &Path, allowed_root: &Path) -> Result<ContentHash, HashError> {
    let resolved = path.canonicalize().map_err(|e| classify_io(path, e))?;
    let root = allowed_root
        .canonicalize()
        .map_err(|e| classify_io(allowed_root, e))?;

    if !resolved.starts_with(&root) {
        return Err(HashError::SymlinkOutsideRoot {
            path: path.to_path_buf(),
            resolved,
            root,
        });
    }

    let mut file = File::open(&resolved).map_err(|e| classify_io(path, e))?;
    let mut hasher = Sha256::default();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) => {
                return Err(HashError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    Ok(ContentHash {
        hex: format!("{:x}", hasher.finalize()),
    })
}

fn classify_io(path: &Path, e: io::Error) -> HashError {
    match e.kind() {
        io::ErrorKind::NotFound => HashError::FileNotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => HashError::PermissionDenied {
            path: path.to_path_buf(),
            source: e,
        },
        _ => HashError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    }
}
