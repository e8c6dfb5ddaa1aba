//! Domain model for chart override discovery.

pub mod category;
pub mod error;
pub mod params;
pub mod task;
pub mod validation;

pub use category::ErrorCategory;
pub use error::{Result, SetupError, SolverError};
pub use params::{flatten_document, ParameterSet};
pub use task::{
    Attempt, SearchPhase, Target, TargetClassification, TargetOutcome, TargetRecord, TargetTask,
};
pub use validation::{ValidationResult, ValidationStatus};
