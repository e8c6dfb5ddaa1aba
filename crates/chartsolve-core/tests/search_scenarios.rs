use std::path::Path;

use chartsolve_core::fakes::ScriptedOracle;
use chartsolve_core::{
    minimize, ErrorCategory, Oracle, ParameterSet, SearchController, SearchPhase, SolverConfig,
    Target, TargetOutcome,
};
use serde_json::json;

fn chart(name: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Chart.yaml"),
        format!("apiVersion: v2\nname: {name}\nversion: 1.0.0\n"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("values.yaml"),
        "image:\n  registry: docker.io\n  repository: acme/app\n",
    )
    .unwrap();
    dir
}

fn letters(keys: &[&str]) -> ParameterSet {
    ParameterSet::from_pairs(keys.iter().map(|k| (*k, json!(true))))
}

#[tokio::test]
async fn test_baseline_success_yields_empty_minimal_set() {
    let dir = chart("app");
    let config = SolverConfig::default();
    let oracle = ScriptedOracle::always_accept();

    let record = SearchController::new(&config, &oracle)
        .solve(&Target::new("acme/app", dir.path()))
        .await;

    assert_eq!(record.outcome, TargetOutcome::Solved);
    assert_eq!(record.minimal_success_params, Some(ParameterSet::new()));
    assert_eq!(record.attempts.len(), 1);
    assert_eq!(record.attempts[0].phase, SearchPhase::Baseline);
    assert_eq!(record.minimization_calls, 0);
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn test_kitchen_sink_minimizes_to_required_singleton() {
    chartsolve_core::init_tracing(false, tracing::Level::DEBUG);
    let dir = chart("app");
    let config = SolverConfig::default();
    let insecure = ParameterSet::new().with("global.security.allowInsecureImages", json!(true));
    let oracle = ScriptedOracle::requires(insecure.clone());

    let record = SearchController::new(&config, &oracle)
        .solve(&Target::new("bitnami/app", dir.path()))
        .await;

    assert_eq!(record.outcome, TargetOutcome::Solved);
    assert_eq!(record.minimal_success_params, Some(insecure));
    let phases: Vec<_> = record.attempts.iter().map(|a| a.phase).collect();
    assert_eq!(
        phases,
        vec![SearchPhase::Baseline, SearchPhase::SingleKnob, SearchPhase::AllParams]
    );
    assert!(!record.attempts[0].success);
    assert!(!record.attempts[1].success);
    assert!(record.attempts[2].success);
    // one check per singleton up to allowInsecureImages in key order
    assert_eq!(record.minimization_calls, 4);
    assert!(record.error_details.is_none());
}

#[tokio::test]
async fn test_timeout_is_recorded_and_search_continues() {
    let dir = chart("slow");
    let config = SolverConfig::default();
    let oracle = ScriptedOracle::always_accept().with_timeout_when(|params| params.is_empty());

    let record = SearchController::new(&config, &oracle)
        .solve(&Target::new("acme/slow", dir.path()))
        .await;

    let first = &record.attempts[0];
    assert!(!first.success);
    assert_eq!(first.error_category, Some(ErrorCategory::TimeoutError));
    assert_eq!(record.attempts[1].phase, SearchPhase::SingleKnob);
    assert!(record.attempts[1].success);
    assert_eq!(record.outcome, TargetOutcome::Solved);
    assert_eq!(
        record.minimal_success_params,
        Some(ParameterSet::new().with("kubeVersion", json!("1.28.0")))
    );
    assert_eq!(record.error_categories, vec![ErrorCategory::TimeoutError]);
}

#[tokio::test]
async fn test_rejections_are_categorized_per_attempt() {
    let dir = chart("strict");
    let config = SolverConfig {
        max_attempts_per_target: 4,
        ..SolverConfig::default()
    };
    let oracle = ScriptedOracle::always_reject()
        .with_diagnostic("Error: required value \"global.storageClass\" is missing");

    let record = SearchController::new(&config, &oracle)
        .solve(&Target::new("acme/strict", dir.path()))
        .await;

    assert_eq!(record.outcome, TargetOutcome::Exhausted);
    assert!(record
        .attempts
        .iter()
        .all(|a| a.error_category == Some(ErrorCategory::RequiredValueError)));
    assert_eq!(record.error_categories, vec![ErrorCategory::RequiredValueError]);
    assert!(record
        .error_details
        .as_deref()
        .unwrap()
        .contains("global.storageClass"));
}

#[tokio::test]
async fn test_minimized_set_is_accepted_and_no_larger() {
    let path = Path::new("/charts/app");
    let working = letters(&["a", "b", "c", "d", "e", "f"]);
    let cases = [
        letters(&["e", "f"]),
        letters(&["a", "c", "e"]),
        letters(&["b"]),
        letters(&["a", "b", "c", "d", "e", "f"]),
    ];

    for required in cases {
        let oracle = ScriptedOracle::requires(required.clone());
        let minimized = minimize(&oracle, path, &working).await;

        assert!(minimized.params.is_subset_of(&working));
        assert!(minimized.params.len() <= working.len());
        assert!(
            oracle.invoke(path, &minimized.params).await.passed(),
            "minimal set for {required} was rejected"
        );
        assert!(required.is_subset_of(&minimized.params));
    }
}

#[tokio::test]
async fn test_accepted_singleton_is_always_found() {
    let path = Path::new("/charts/app");
    let working = letters(&["a", "b", "c", "d", "e"]);
    let oracle = ScriptedOracle::new(|params| params.contains_key("d") || params.contains_key("b"));

    let minimized = minimize(&oracle, path, &working).await;

    assert_eq!(minimized.params, letters(&["b"]));
    assert_eq!(minimized.calls, 2);
}

#[tokio::test]
async fn test_minimizing_twice_changes_nothing() {
    let path = Path::new("/charts/app");
    let working = letters(&["a", "b", "c", "d", "e", "f"]);

    for required in [letters(&["e", "f"]), letters(&["a", "c", "e"]), letters(&["c"])] {
        let oracle = ScriptedOracle::requires(required);
        let once = minimize(&oracle, path, &working).await;
        let twice = minimize(&oracle, path, &once.params).await;
        assert_eq!(once.params, twice.params);
    }
}

#[tokio::test]
async fn test_targets_do_not_share_search_state() {
    let a = chart("a");
    let b = chart("b");
    let b_path = b.path().to_path_buf();
    let config = SolverConfig::default();
    let oracle = ScriptedOracle::per_target(move |path, params| path != b_path || !params.is_empty());
    let controller = SearchController::new(&config, &oracle);

    let first = controller.solve(&Target::new("acme/a", a.path())).await;
    let second = controller.solve(&Target::new("acme/b", b.path())).await;

    assert_eq!(first.attempts.len(), 1);
    assert_eq!(second.attempts.len(), 2);
    assert_eq!(oracle.calls_for(a.path()), 1);
    assert_eq!(oracle.calls_for(b.path()), 2);
}
