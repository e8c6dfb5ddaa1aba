//! Per-batch counters.
//!
//! One [`BatchStats`] is created per batch and passed `&mut` into the engine;
//! there is no process-wide instance, so concurrent batches cannot mix counts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ErrorCategory, TargetOutcome, TargetRecord};
use crate::obs;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub solved: usize,
    pub unsolved: usize,
    pub setup_failures: usize,
    pub worker_failures: usize,
    /// Targets skipped because the checkpoint already held them.
    pub resumed: usize,
    /// Logged attempts plus minimization calls.
    pub oracle_calls: u64,
    pub categories: BTreeMap<ErrorCategory, usize>,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished record.
    pub fn record(&mut self, record: &TargetRecord) {
        match record.outcome {
            TargetOutcome::Solved => self.solved += 1,
            TargetOutcome::Exhausted => self.unsolved += 1,
            TargetOutcome::SetupError | TargetOutcome::ExtractionError => {
                self.unsolved += 1;
                self.setup_failures += 1;
            }
            TargetOutcome::WorkerFailure => {
                self.unsolved += 1;
                self.worker_failures += 1;
            }
        }
        self.oracle_calls += record.attempts.len() as u64 + u64::from(record.minimization_calls);
        for category in &record.error_categories {
            *self.categories.entry(*category).or_insert(0) += 1;
        }
    }

    pub fn record_resumed(&mut self, count: usize) {
        self.resumed += count;
    }

    /// Targets processed in this run (excluding resumed ones).
    pub fn processed(&self) -> usize {
        self.solved + self.unsolved
    }

    /// Emit the totals as one `batch.finished` event.
    pub fn flush(&self, duration_ms: u64) {
        obs::emit_batch_finished(
            self.processed() + self.resumed,
            self.solved,
            self.unsolved,
            self.resumed,
            self.oracle_calls,
            duration_ms,
        );
    }
}
