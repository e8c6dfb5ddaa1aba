//! Parallel batch engine.
//!
//! Targets are fanned out to at most `max_workers` concurrent tasks. Each task
//! runs the search controller for one target to completion and hands its
//! record back; the engine alone merges records (in arrival order) and writes
//! the checkpoint.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::task::JoinError;
use tracing::{info, Instrument};

use crate::checkpoint::{CheckpointStore, ResultMap};
use crate::config::SolverConfig;
use crate::domain::{Result, Target, TargetRecord};
use crate::obs;
use crate::oracle::Oracle;
use crate::stats::BatchStats;
use crate::strategy::SearchController;

/// Completed targets between progress log lines.
const PROGRESS_EVERY: usize = 10;

pub struct BatchEngine {
    config: SolverConfig,
    oracle: Arc<dyn Oracle>,
    store: CheckpointStore,
}

impl BatchEngine {
    /// Fails if `config` does not validate.
    pub fn new(config: SolverConfig, oracle: Arc<dyn Oracle>, store: CheckpointStore) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            oracle,
            store,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run `targets`, skipping ids already present in the checkpoint.
    pub async fn resume(&self, targets: &[Target], stats: &mut BatchStats) -> Result<ResultMap> {
        let existing = self.store.load()?;
        self.run(targets, existing, stats).await
    }

    /// Run `targets` on top of `results`. Ids already in `results` are not
    /// re-attempted. Returns the merged map, which is also checkpointed.
    pub async fn run(
        &self,
        targets: &[Target],
        mut results: ResultMap,
        stats: &mut BatchStats,
    ) -> Result<ResultMap> {
        let started = Instant::now();

        let mut seen = HashSet::new();
        let mut resumed = 0;
        let mut pending = Vec::new();
        for target in targets {
            if !seen.insert(target.id.as_str()) {
                continue;
            }
            if results.contains_key(&target.id) {
                resumed += 1;
            } else {
                pending.push(target.clone());
            }
        }
        stats.record_resumed(resumed);

        let total = pending.len();
        info!(
            pending = total,
            resumed,
            workers = self.config.max_workers,
            strategy = %self.config.strategy,
            "starting batch"
        );

        let mut records = stream::iter(pending.into_iter().map(|target| {
            let config = self.config.clone();
            let oracle = Arc::clone(&self.oracle);
            async move {
                let span = obs::target_span(&target.id);
                let worker = tokio::spawn(solve_target(config, oracle, target.clone()).instrument(span));
                let record = match worker.await {
                    Ok(record) => record,
                    Err(err) => {
                        let details = join_error_text(err);
                        obs::emit_worker_failed(&target.id, &details);
                        TargetRecord::worker_failure(&target, details)
                    }
                };
                (target.id, record)
            }
        }))
        .buffer_unordered(self.config.max_workers);

        let mut completed = 0;
        let mut since_save = 0;
        while let Some((id, record)) = records.next().await {
            stats.record(&record);
            results.insert(id, record);
            completed += 1;
            since_save += 1;

            if completed % PROGRESS_EVERY == 0 {
                info!(completed, total, solved = stats.solved, "batch progress");
            }
            if since_save >= self.config.checkpoint_interval {
                self.save(&results)?;
                since_save = 0;
            }
        }

        self.save(&results)?;
        stats.flush(started.elapsed().as_millis() as u64);
        Ok(results)
    }

    fn save(&self, results: &ResultMap) -> Result<()> {
        self.store.save(results)?;
        obs::emit_checkpoint_saved(self.store.path(), results.len());
        Ok(())
    }
}

/// Worker entry point. Owns everything it touches.
async fn solve_target(config: SolverConfig, oracle: Arc<dyn Oracle>, target: Target) -> TargetRecord {
    SearchController::new(&config, oracle.as_ref())
        .solve(&target)
        .await
}

fn join_error_text(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("worker cancelled: {err}");
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCategory, ParameterSet, TargetOutcome};
    use crate::fakes::ScriptedOracle;
    use serde_json::json;
    use std::path::Path;

    fn charts(root: &Path, names: &[&str]) -> Vec<Target> {
        names
            .iter()
            .map(|name| {
                let dir = root.join(name);
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("Chart.yaml"), format!("name: {name}\n")).unwrap();
                Target::new(format!("acme/{name}"), dir)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_every_target_gets_a_record() {
        let root = tempfile::tempdir().unwrap();
        let mut targets = charts(root.path(), &["a", "b", "c"]);
        targets.push(Target::new("acme/missing", root.path().join("missing-1.0.0.tgz")));

        let oracle = Arc::new(ScriptedOracle::requires(
            ParameterSet::new().with("kubeVersion", json!("1.28.0")),
        ));
        let store = CheckpointStore::in_dir(root.path());
        let config = SolverConfig {
            max_workers: 2,
            ..SolverConfig::default()
        };
        let engine = BatchEngine::new(config, oracle.clone(), store.clone()).unwrap();

        let mut stats = BatchStats::new();
        let results = engine.run(&targets, ResultMap::new(), &mut stats).await.unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results["acme/missing"].outcome, TargetOutcome::SetupError);
        assert_eq!(stats.solved, 3);
        assert_eq!(stats.setup_failures, 1);
        // baseline + single knob per chart
        assert_eq!(oracle.calls(), 6);
        assert_eq!(store.load().unwrap(), results);
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_record() {
        let root = tempfile::tempdir().unwrap();
        let targets = charts(root.path(), &["ok", "bad"]);
        let bad_dir = root.path().join("bad");
        let oracle = Arc::new(ScriptedOracle::per_target(move |path, _| {
            if path == bad_dir {
                panic!("validator wrapper exploded");
            }
            true
        }));
        let engine =
            BatchEngine::new(SolverConfig::default(), oracle, CheckpointStore::in_dir(root.path())).unwrap();

        let mut stats = BatchStats::new();
        let results = engine.run(&targets, ResultMap::new(), &mut stats).await.unwrap();

        let bad = &results["acme/bad"];
        assert_eq!(bad.outcome, TargetOutcome::WorkerFailure);
        assert_eq!(bad.error_categories, vec![ErrorCategory::UnknownError]);
        assert!(bad
            .error_details
            .as_deref()
            .unwrap()
            .contains("validator wrapper exploded"));
        assert_eq!(results["acme/ok"].outcome, TargetOutcome::Solved);
        assert_eq!(stats.worker_failures, 1);
    }

    #[tokio::test]
    async fn test_known_ids_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let targets = charts(root.path(), &["a", "b"]);
        let oracle = Arc::new(ScriptedOracle::always_accept());
        let engine = BatchEngine::new(
            SolverConfig::default(),
            oracle.clone(),
            CheckpointStore::in_dir(root.path()),
        )
        .unwrap();

        let mut stats = BatchStats::new();
        let first = engine.run(&targets[..1], ResultMap::new(), &mut stats).await.unwrap();
        assert_eq!(oracle.calls(), 1);

        let mut stats = BatchStats::new();
        let all = engine.resume(&targets, &mut stats).await.unwrap();
        assert_eq!(oracle.calls(), 2);
        assert_eq!(stats.resumed, 1);
        assert_eq!(all["acme/a"], first["acme/a"]);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SolverConfig {
            checkpoint_interval: 0,
            ..SolverConfig::default()
        };
        let oracle: Arc<dyn Oracle> = Arc::new(ScriptedOracle::always_accept());
        assert!(BatchEngine::new(config, oracle, CheckpointStore::new("x.json")).is_err());
    }
}
