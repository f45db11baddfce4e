//! Known-items ledger.
//!
//! Append-only, per-source record of previously imported source paths. The
//! ledger is independent of the baseline index: it keyes on the *source*
//! path, so a file re-offered by the same source is recognized even after
//! library content moves. Appends deduplicate by path, and writes go
//! through the atomic-write discipline.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::fs_atomic::write_json_atomic;
use crate::model::{KnownItem, KnownItemsTracking};

/// Load a source's ledger, or an empty one when no file exists yet.
pub fn load_or_empty(path: &Path, source_id: Uuid) -> Result<KnownItemsTracking, LedgerError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(KnownItemsTracking {
                source_id,
                items: Vec::new(),
                last_updated: Utc::now(),
            });
        }
        Err(e) => {
            return Err(LedgerError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| LedgerError::Malformed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Append items, filtering out source paths already present.
pub fn append(
    tracking: &KnownItemsTracking,
    new_items: Vec<KnownItem>,
    now: DateTime<Utc>,
) -> KnownItemsTracking {
    let mut seen: std::collections::BTreeSet<_> =
        tracking.items.iter().map(|i| i.path.clone()).collect();

    let mut items = tracking.items.clone();
    for item in new_items {
        if seen.insert(item.path.clone()) {
            items.push(item);
        }
    }

    KnownItemsTracking {
        source_id: tracking.source_id,
        items,
        last_updated: now,
    }
}

/// Persist the ledger atomically.
pub fn write(tracking: &KnownItemsTracking, path: &Path) -> Result<(), LedgerError> {
    write_json_atomic(path, tracking)?;
    Ok(())
}
