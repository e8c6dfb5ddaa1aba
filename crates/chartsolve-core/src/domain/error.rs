//! Error taxonomy for the solver.
//!
//! Oracle rejections are not errors: they are [`ValidationResult`] values and
//! flow through the search as data. The types here cover what can genuinely
//! fail around the search: configuration, checkpoint I/O and target setup.
//!
//! [`ValidationResult`]: crate::domain::validation::ValidationResult

use std::path::PathBuf;

/// Errors raised while preparing a target for validation.
///
/// These are terminal for the affected target only.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("target path does not exist: {0}")]
    TargetMissing(PathBuf),

    #[error("failed to unpack {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("no chart directory found after unpacking {0}")]
    NoChartDirectory(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SetupError {
    /// Whether this failure happened while unpacking an archive
    /// (as opposed to locating the target at all).
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            SetupError::Extraction { .. } | SetupError::NoChartDirectory(_)
        )
    }
}

/// Solver errors.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("checkpoint {path} is unreadable: {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
