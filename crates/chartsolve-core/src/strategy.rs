//! Per-target search controller.
//!
//! A target moves through an ordered list of phases (see
//! [`SearchStrategy::phases`]) and stops at the first accepted parameter set.
//! Every oracle call outside minimization is logged as an [`Attempt`], so a
//! finished record always carries the full audit trail.
//!
//! [`Attempt`]: crate::domain::Attempt

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::candidates::{all_params, pairwise_combinations, targeted_combinations, Substitutions};
use crate::config::SolverConfig;
use crate::domain::{
    ErrorCategory, ParameterSet, SearchPhase, SetupError, SolverError, Target,
    TargetClassification, TargetOutcome, TargetRecord, TargetTask,
};
use crate::minimizer::minimize;
use crate::obs;
use crate::oracle::Oracle;
use crate::workspace::{classify_chart, extract_provider, prepare_target};

/// Search strategy. Each variant maps to a fixed phase table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Baseline, single knob, kitchen sink, targeted combinations.
    #[default]
    Binary,
    /// `Binary`, then matrix singles and version pairs.
    Exhaustive,
}

const BINARY_PHASES: [SearchPhase; 4] = [
    SearchPhase::Baseline,
    SearchPhase::SingleKnob,
    SearchPhase::AllParams,
    SearchPhase::Targeted,
];

const EXHAUSTIVE_PHASES: [SearchPhase; 5] = [
    SearchPhase::Baseline,
    SearchPhase::SingleKnob,
    SearchPhase::AllParams,
    SearchPhase::Targeted,
    SearchPhase::Exhaustive,
];

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 2] = [SearchStrategy::Binary, SearchStrategy::Exhaustive];

    pub fn phases(self) -> &'static [SearchPhase] {
        match self {
            SearchStrategy::Binary => &BINARY_PHASES,
            SearchStrategy::Exhaustive => &EXHAUSTIVE_PHASES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchStrategy::Binary => "binary",
            SearchStrategy::Exhaustive => "exhaustive",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| SolverError::InvalidConfig(format!("unknown search strategy '{s}'")))
    }
}

/// Whether a phase draws from the per-target attempt budget. The first three
/// phases always run.
fn budgeted(phase: SearchPhase) -> bool {
    matches!(phase, SearchPhase::Targeted | SearchPhase::Exhaustive)
}

/// Runs the phase table for one target at a time.
pub struct SearchController<'a> {
    config: &'a SolverConfig,
    oracle: &'a dyn Oracle,
    subs: Substitutions,
}

impl<'a> SearchController<'a> {
    pub fn new(config: &'a SolverConfig, oracle: &'a dyn Oracle) -> Self {
        Self {
            config,
            oracle,
            subs: Substitutions::from_config(config),
        }
    }

    /// Prepare, search and finalize one target. Never fails: setup problems
    /// become `SetupError`/`ExtractionError` records without oracle calls.
    pub async fn solve(&self, target: &Target) -> TargetRecord {
        let started = Instant::now();
        obs::emit_target_started(&target.id, &target.path);

        let record = match prepare_target(&target.id, &target.path).await {
            Err(err) => setup_failure(target, &err, elapsed_ms(started)),
            Ok(prepared) => {
                let classification = classify_chart(prepared.path());
                let provider = extract_provider(&target.id);
                let mut task = TargetTask::new(target, classification, provider);
                let outcome = self.search(&mut task, prepared.path()).await;
                task.finish(outcome, elapsed_ms(started))
            }
        };

        obs::emit_target_finished(
            &target.id,
            record.outcome,
            record.attempts.len(),
            record.minimal_success_params.as_ref(),
            record.duration_ms,
        );
        record
    }

    /// Run the phase table against an already prepared chart directory.
    pub async fn search(&self, task: &mut TargetTask, chart_path: &Path) -> TargetOutcome {
        let budget = self.config.max_attempts_per_target;

        for &phase in self.config.strategy.phases() {
            for params in self.candidates_for(phase, task) {
                if budgeted(phase) && task.attempts_used() >= budget {
                    info!(target_id = %task.id, budget, "attempt budget exhausted");
                    return TargetOutcome::Exhausted;
                }
                if task.has_tried(&params) {
                    continue;
                }

                let result = self.oracle.invoke(chart_path, &params).await;
                obs::emit_oracle_invoked(&task.id, phase, &params, &result);
                task.record_attempt(phase, &params, &result);

                if !result.passed() {
                    task.error_details = Some(result.details);
                    continue;
                }

                let minimal = match phase {
                    SearchPhase::Baseline | SearchPhase::SingleKnob => params,
                    _ => {
                        let minimized = minimize(self.oracle, chart_path, &params).await;
                        task.minimization_calls += minimized.calls;
                        minimized.params
                    }
                };
                task.minimal_success_params = Some(minimal);
                task.error_details = None;
                return TargetOutcome::Solved;
            }
        }

        TargetOutcome::Exhausted
    }

    fn candidates_for(&self, phase: SearchPhase, task: &TargetTask) -> Vec<ParameterSet> {
        let config = self.config;
        match phase {
            SearchPhase::Baseline => vec![ParameterSet::new()],
            SearchPhase::SingleKnob => vec![ParameterSet::new().with(
                config.version_parameter.clone(),
                json!(config.preferred_version),
            )],
            SearchPhase::AllParams => {
                let sink = all_params(&config.parameter_matrix, &self.subs);
                if sink.is_empty() {
                    Vec::new()
                } else {
                    vec![sink]
                }
            }
            SearchPhase::Targeted => targeted_combinations(
                &task.id,
                task.classification,
                task.provider.as_deref(),
                &task.error_categories_seen,
                config,
            ),
            SearchPhase::Exhaustive => {
                let mut combos = pairwise_combinations(
                    &config.parameter_matrix,
                    &self.subs,
                    &config.version_parameter,
                    2,
                );
                combos.sort_by_key(ParameterSet::len);
                combos
            }
        }
    }
}

fn setup_failure(target: &Target, err: &SetupError, duration_ms: u64) -> TargetRecord {
    let (outcome, category) = if err.is_extraction() {
        (TargetOutcome::ExtractionError, ErrorCategory::ExtractionError)
    } else {
        (TargetOutcome::SetupError, ErrorCategory::SetupError)
    };
    warn!(target_id = %target.id, error = %err, "target setup failed");

    let mut task = TargetTask::new(
        target,
        TargetClassification::Unclassified,
        extract_provider(&target.id),
    );
    task.note_category(category);
    task.error_details = Some(err.to_string());
    task.finish(outcome, duration_ms)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
