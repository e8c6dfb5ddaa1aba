//! Checkpoint store: the durable result map that makes batches resumable.
//!
//! The file is a JSON object keyed by target id. Writes go to a temporary
//! file in the same directory which is then renamed over the checkpoint, so
//! a reader never observes a partial file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::{Result, SolverError, TargetRecord};

/// Target id -> finalized record.
pub type ResultMap = BTreeMap<String, TargetRecord>;

/// Default checkpoint file name inside an output directory.
pub const CHECKPOINT_FILE: &str = "solver_checkpoint.json";

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/solver_checkpoint.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CHECKPOINT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint. A missing file is an empty map; an unreadable
    /// or malformed one is an error.
    pub fn load(&self) -> Result<ResultMap> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ResultMap::new()),
            Err(e) => {
                return Err(SolverError::Checkpoint {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_str(&raw).map_err(|e| SolverError::Checkpoint {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Atomically replace the checkpoint with `results`.
    pub fn save(&self, results: &ResultMap) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let body = serde_json::to_vec_pretty(results)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
