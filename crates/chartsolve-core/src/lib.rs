//! chartsolve core library
//!
//! Finds, per chart, a minimal set of value overrides that makes an external
//! validator accept it. The validator is reached only through [`Oracle`].

pub mod candidates;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod minimizer;
pub mod obs;
pub mod oracle;
pub mod report;
pub mod stats;
pub mod strategy;
pub mod telemetry;
pub mod workspace;

pub use domain::{
    flatten_document, Attempt, ErrorCategory, ParameterSet, Result, SearchPhase, SetupError,
    SolverError, Target, TargetClassification, TargetOutcome, TargetRecord, TargetTask,
    ValidationResult, ValidationStatus,
};

pub use candidates::{
    all_params, default_matrix, pairwise_combinations, targeted_combinations, ParameterMatrix,
    Substitutions, TARGET_REGISTRY_PLACEHOLDER,
};
pub use checkpoint::{CheckpointStore, ResultMap, CHECKPOINT_FILE};
pub use classifier::{classify, ClassifierRule, ErrorClassifier, MatchPattern, RuleSet};
pub use config::{ParameterPassing, SolverConfig};
pub use engine::BatchEngine;
pub use minimizer::{minimize, Minimized};
pub use oracle::Oracle;
pub use report::{
    build_report, compare_results, group_by_minimal_params, load_results, render_comparison_md,
    summarize, write_report_json, ResultComparison, SolverReport, REPORT_FILE,
};
pub use stats::BatchStats;
pub use strategy::{SearchController, SearchStrategy};
pub use workspace::{
    classify_chart, discover_targets, extract_provider, prepare_target, prepare_target_within,
    PreparedTarget, EXTRACT_TIMEOUT,
};

pub use obs::{
    emit_batch_finished, emit_checkpoint_saved, emit_oracle_invoked, emit_target_finished,
    emit_target_started, emit_worker_failed, target_span,
};
pub use telemetry::init_tracing;

/// chartsolve version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
