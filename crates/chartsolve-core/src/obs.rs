//! Structured lifecycle events for a solver batch.
//!
//! Every event carries an `event` field (`target.started`, `oracle.invoked`,
//! ...) so log pipelines can filter on it regardless of message text.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::{ParameterSet, SearchPhase, TargetOutcome, ValidationResult};

/// Span tagging everything logged while one target is processed.
///
/// Attach it to the worker future with [`tracing::Instrument`]; an entered
/// span guard cannot be held across `.await` in a spawned task.
///
/// ```ignore
/// solve(target).instrument(target_span("bitnami/nginx")).await;
/// ```
pub fn target_span(target_id: &str) -> tracing::Span {
    tracing::info_span!("chartsolve.target", target_id = %target_id)
}

pub fn emit_target_started(target_id: &str, path: &Path) {
    info!(event = "target.started", target_id = %target_id, path = %path.display());
}

/// Emit event: a target reached a terminal state.
pub fn emit_target_finished(
    target_id: &str,
    outcome: TargetOutcome,
    attempts: usize,
    minimal: Option<&ParameterSet>,
    duration_ms: u64,
) {
    let minimal = minimal.map(ToString::to_string).unwrap_or_else(|| "none".to_string());
    info!(
        event = "target.finished",
        target_id = %target_id,
        outcome = ?outcome,
        attempts = attempts,
        minimal = %minimal,
        duration_ms = duration_ms,
    );
}

/// Emit event: one logged oracle call. Debug level; a batch makes thousands.
///
/// `params_digest` is [`ParameterSet::fingerprint`].
pub fn emit_oracle_invoked(
    target_id: &str,
    phase: SearchPhase,
    params: &ParameterSet,
    result: &ValidationResult,
) {
    debug!(
        event = "oracle.invoked",
        target_id = %target_id,
        phase = ?phase,
        params = %params,
        params_digest = %params.fingerprint(),
        success = result.passed(),
        category = ?result.category,
        duration_ms = (result.duration * 1000.0) as u64,
    );
}

pub fn emit_checkpoint_saved(path: &Path, targets: usize) {
    info!(event = "checkpoint.saved", path = %path.display(), targets = targets);
}

/// Emit event: batch totals.
pub fn emit_batch_finished(
    total: usize,
    solved: usize,
    unsolved: usize,
    skipped: usize,
    oracle_calls: u64,
    duration_ms: u64,
) {
    info!(
        event = "batch.finished",
        total = total,
        solved = solved,
        unsolved = unsolved,
        skipped = skipped,
        oracle_calls = oracle_calls,
        duration_ms = duration_ms,
    );
}

/// Emit event: a worker died instead of returning a record (warning level).
pub fn emit_worker_failed(target_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "worker.failed", target_id = %target_id, error = %error);
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_oracle_invoked_carries_params_digest() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let params = ParameterSet::new().with("kubeVersion", json!("1.28.0"));
        tracing::subscriber::with_default(subscriber, || {
            emit_oracle_invoked(
                "bitnami/nginx",
                SearchPhase::SingleKnob,
                &params,
                &ValidationResult::success(0.2),
            );
        });

        let logged = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("oracle.invoked"), "{logged}");
        assert!(
            logged.contains(&format!("params_digest={}", params.fingerprint())),
            "{logged}"
        );
    }

    #[test]
    fn test_target_span_enter() {
        let _entered = target_span("bitnami/nginx").entered();
        emit_target_started("bitnami/nginx", Path::new("/charts/nginx"));
        emit_target_finished("bitnami/nginx", TargetOutcome::Exhausted, 3, None, 10);
    }
}
