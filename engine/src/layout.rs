//! Library control-directory layout.
//!
//! All engine state lives under `<library>/.mediahub/`:
//!
//! ```text
//! .mediahub/registry/index.json                      baseline index
//! .mediahub/sources/<sourceId>/detections/<ts>.json  detection results
//! .mediahub/sources/<sourceId>/imports/<ts>.json     import results
//! .mediahub/sources/<sourceId>/known-items.json      known-items ledger
//! .mediahub/sources/<sourceId>/source-state.json     last-detection stamp
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Name of the control directory under the library root.
pub const CONTROL_DIR_NAME: &str = ".mediahub";

/// Path schema over a library root.
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        LibraryLayout {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR_NAME)
    }

    pub fn index_path(&self) -> PathBuf {
        self.control_dir().join("registry").join("index.json")
    }

    pub fn source_dir(&self, source_id: Uuid) -> PathBuf {
        self.control_dir().join("sources").join(source_id.to_string())
    }

    pub fn detections_dir(&self, source_id: Uuid) -> PathBuf {
        self.source_dir(source_id).join("detections")
    }

    pub fn imports_dir(&self, source_id: Uuid) -> PathBuf {
        self.source_dir(source_id).join("imports")
    }

    pub fn known_items_path(&self, source_id: Uuid) -> PathBuf {
        self.source_dir(source_id).join("known-items.json")
    }

    pub fn source_state_path(&self, source_id: Uuid) -> PathBuf {
        self.source_dir(source_id).join("source-state.json")
    }

    /// Absolute path of a library-relative media path.
    pub fn media_path(&self, relative: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in relative.split('/') {
            path.push(part);
        }
        path
    }
}

/// Result filename for a run timestamp: RFC 3339 seconds precision with
/// `:` replaced by `-` (filesystem-safe), plus `.json`.
pub fn result_file_name(timestamp: DateTime<Utc>) -> String {
    let stamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Secs, true)
        .replace(':', "-");
    format!("{}.json", stamp)
}
