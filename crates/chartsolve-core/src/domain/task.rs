//! Per-target search state and its finalized record.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::category::ErrorCategory;
use super::params::ParameterSet;
use super::validation::ValidationResult;

/// One unit of batch input: an id plus a chart directory or archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub path: PathBuf,
}

impl Target {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Coarse chart layout, used to pick targeted combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetClassification {
    /// Chart published or maintained by Bitnami.
    Bitnami,
    /// `image:` is a mapping with a `registry:` key.
    StandardMap,
    /// `image:` is a single string.
    StandardString,
    Standard,
    /// Classification never ran because setup failed.
    Unclassified,
}

impl fmt::Display for TargetClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetClassification::Bitnami => "BITNAMI",
            TargetClassification::StandardMap => "STANDARD_MAP",
            TargetClassification::StandardString => "STANDARD_STRING",
            TargetClassification::Standard => "STANDARD",
            TargetClassification::Unclassified => "UNCLASSIFIED",
        };
        f.write_str(s)
    }
}

/// Search step that produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Empty parameter set.
    Baseline,
    /// The single highest-value knob.
    SingleKnob,
    /// Every parameter of the matrix at once.
    AllParams,
    /// Hand-ranked combinations.
    Targeted,
    /// Singletons and version pairs from the matrix.
    Exhaustive,
}

/// Terminal state of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutcome {
    /// A parameter set was found and minimized.
    Solved,
    /// The attempt budget ran out without an accepted set.
    Exhausted,
    /// The target could not be located.
    SetupError,
    /// The packaged target could not be unpacked.
    ExtractionError,
    /// The worker failed unexpectedly.
    WorkerFailure,
}

/// One logged oracle call within a target's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub phase: SearchPhase,
    pub parameters: ParameterSet,
    pub success: bool,
    pub error_category: Option<ErrorCategory>,
}

/// Mutable per-target search state, owned by the strategy controller.
#[derive(Debug, Clone)]
pub struct TargetTask {
    pub id: String,
    pub path: PathBuf,
    pub classification: TargetClassification,
    pub provider: Option<String>,
    pub attempts: Vec<Attempt>,
    pub minimal_success_params: Option<ParameterSet>,
    /// Categories in first-seen order, without duplicates.
    pub error_categories_seen: Vec<ErrorCategory>,
    pub error_details: Option<String>,
    pub minimization_calls: u32,
}

impl TargetTask {
    pub fn new(
        target: &Target,
        classification: TargetClassification,
        provider: Option<String>,
    ) -> Self {
        Self {
            id: target.id.clone(),
            path: target.path.clone(),
            classification,
            provider,
            attempts: Vec::new(),
            minimal_success_params: None,
            error_categories_seen: Vec::new(),
            error_details: None,
            minimization_calls: 0,
        }
    }

    /// Append an attempt for `result` and track its category.
    pub fn record_attempt(
        &mut self,
        phase: SearchPhase,
        parameters: &ParameterSet,
        result: &ValidationResult,
    ) {
        let success = result.passed();
        let error_category = if success { None } else { result.category };
        self.attempts.push(Attempt {
            phase,
            parameters: parameters.clone(),
            success,
            error_category,
        });
        if let Some(category) = error_category {
            self.note_category(category);
        }
    }

    /// Track a category without an attempt (setup failures, crashes).
    pub fn note_category(&mut self, category: ErrorCategory) {
        if !self.error_categories_seen.contains(&category) {
            self.error_categories_seen.push(category);
        }
    }

    pub fn attempts_used(&self) -> usize {
        self.attempts.len()
    }

    /// Whether an attempt with exactly these parameters was already made.
    pub fn has_tried(&self, params: &ParameterSet) -> bool {
        self.attempts.iter().any(|a| &a.parameters == params)
    }

    /// Freeze the task into its persisted form.
    pub fn finish(self, outcome: TargetOutcome, duration_ms: u64) -> TargetRecord {
        TargetRecord {
            path: self.path,
            classification: self.classification,
            provider: self.provider,
            outcome,
            attempts: self.attempts,
            minimal_success_params: self.minimal_success_params,
            error_categories: self.error_categories_seen,
            error_details: self.error_details,
            minimization_calls: self.minimization_calls,
            duration_ms,
        }
    }
}

/// Finalized result for one target, as stored in the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub path: PathBuf,
    pub classification: TargetClassification,
    pub provider: Option<String>,
    pub outcome: TargetOutcome,
    pub attempts: Vec<Attempt>,
    pub minimal_success_params: Option<ParameterSet>,
    pub error_categories: Vec<ErrorCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(default)]
    pub minimization_calls: u32,
    #[serde(default)]
    pub duration_ms: u64,
}

impl TargetRecord {
    /// Record for a target whose worker failed before producing a result.
    pub fn worker_failure(target: &Target, details: impl Into<String>) -> Self {
        let mut task = TargetTask::new(target, TargetClassification::Unclassified, None);
        task.note_category(ErrorCategory::UnknownError);
        task.error_details = Some(details.into());
        task.finish(TargetOutcome::WorkerFailure, 0)
    }

    pub fn solved(&self) -> bool {
        self.minimal_success_params.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> Target {
        Target::new("bitnami/nginx", "/charts/nginx-15.0.0.tgz")
    }

    #[test]
    fn test_record_attempt_tracks_categories_once() {
        let mut task = TargetTask::new(&target(), TargetClassification::Bitnami, None);
        let rejected = ValidationResult::rejected(ErrorCategory::SchemaError, "schema", 0.1);
        task.record_attempt(SearchPhase::Baseline, &ParameterSet::new(), &rejected);
        task.record_attempt(
            SearchPhase::SingleKnob,
            &ParameterSet::new().with("kubeVersion", json!("1.28.0")),
            &rejected,
        );
        assert_eq!(task.attempts_used(), 2);
        assert_eq!(task.error_categories_seen, vec![ErrorCategory::SchemaError]);
        assert!(task.has_tried(&ParameterSet::new()));
    }

    #[test]
    fn test_successful_attempt_has_no_category() {
        let mut task = TargetTask::new(&target(), TargetClassification::Standard, None);
        task.record_attempt(
            SearchPhase::Baseline,
            &ParameterSet::new(),
            &ValidationResult::success(0.1),
        );
        assert!(task.attempts[0].success);
        assert!(task.attempts[0].error_category.is_none());
        assert!(task.error_categories_seen.is_empty());
    }

    #[test]
    fn test_worker_failure_record() {
        let record = TargetRecord::worker_failure(&target(), "task panicked");
        assert_eq!(record.outcome, TargetOutcome::WorkerFailure);
        assert_eq!(record.error_categories, vec![ErrorCategory::UnknownError]);
        assert_eq!(record.error_details.as_deref(), Some("task panicked"));
        assert!(!record.solved());
    }

    #[test]
    fn test_record_json_shape() {
        let mut task = TargetTask::new(
            &target(),
            TargetClassification::Bitnami,
            Some("bitnami".to_string()),
        );
        task.minimal_success_params = Some(ParameterSet::new());
        let raw = serde_json::to_value(task.finish(TargetOutcome::Solved, 12)).expect("serialize");
        assert_eq!(raw["classification"], json!("BITNAMI"));
        assert_eq!(raw["provider"], json!("bitnami"));
        assert_eq!(raw["minimal_success_params"], json!({}));
        assert_eq!(raw["outcome"], json!("solved"));
        assert!(raw.get("error_details").is_none());
    }
}
