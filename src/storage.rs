//! File-backed persistence for the canonical tree.
//!
//! The engine itself never performs I/O; this collaborator sits at the
//! Load/Persist boundary. The tree is stored as one JSON document. Saves
//! write to a sibling temp file and rename over the target, so a crash
//! mid-write never corrupts the last good state.

use crate::error::{Error, Result};
use crate::tree::TaskTree;
use crate::types::now_ms;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// JSON file store for the canonical tree.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last-persisted tree. A missing file is not an error: it
    /// yields a tree containing only the synthesized root.
    pub fn load(&self) -> Result<TaskTree> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no data file, starting empty");
                return Ok(TaskTree::bootstrap(now_ms()));
            }
            Err(e) => return Err(Error::Persistence { source: e }),
        };
        let tree: TaskTree = serde_json::from_str(&raw).map_err(|e| Error::Persistence {
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        tree.validate()?;
        Ok(tree)
    }

    /// Persist a committed tree. Failure here does not roll back the
    /// in-memory canonical state; the caller retries persistence.
    pub fn save(&self, tree: &TaskTree) -> Result<()> {
        let json = serde_json::to_string_pretty(tree).map_err(|e| Error::Persistence {
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), revision = tree.revision, "persisted tree");
        Ok(())
    }
}
