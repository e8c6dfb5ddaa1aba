//! Bisection minimizer.
//!
//! Given a parameter set the oracle already accepts, drop parameters the
//! target does not need. The search is a bounded approximation of delta
//! debugging: it finds a locally irreducible set, not a global minimum.
//!
//! Bisection runs on an explicit work stack instead of recursion, so memory
//! use is bounded by the number of parameters rather than by call depth.

use std::path::Path;

use tracing::{debug, warn};

use crate::domain::ParameterSet;
use crate::oracle::Oracle;

/// Result of a minimization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minimized {
    pub params: ParameterSet,
    /// Oracle calls spent.
    pub calls: u32,
}

enum Task {
    /// Minimize `candidate`. `fallback` is a known-good set returned when a
    /// single parameter turns out insufficient.
    Visit {
        candidate: ParameterSet,
        fallback: ParameterSet,
        candidate_verified: bool,
    },
    /// Union the two most recent results and re-verify; keep `candidate`
    /// when the union is rejected.
    Combine { candidate: ParameterSet },
}

/// Minimize `working` against one target.
///
/// `working` must be accepted by the oracle. The returned set is a subset of
/// `working`, and the oracle accepted it during this run unless it is
/// `working` itself.
pub async fn minimize(oracle: &dyn Oracle, target_path: &Path, working: &ParameterSet) -> Minimized {
    let mut minimizer = Minimizer {
        oracle,
        target_path,
        calls: 0,
    };
    let params = minimizer.run(working).await;
    Minimized {
        params,
        calls: minimizer.calls,
    }
}

struct Minimizer<'a> {
    oracle: &'a dyn Oracle,
    target_path: &'a Path,
    calls: u32,
}

impl Minimizer<'_> {
    async fn accepts(&mut self, params: &ParameterSet) -> bool {
        self.calls += 1;
        let result = self.oracle.invoke(self.target_path, params).await;
        debug!(
            target_path = %self.target_path.display(),
            params = %params,
            success = result.passed(),
            "minimizer check"
        );
        result.passed()
    }

    async fn run(&mut self, working: &ParameterSet) -> ParameterSet {
        if working.len() <= 2 {
            return working.clone();
        }

        for key in working.keys() {
            if let Some(single) = working.singleton(key) {
                if self.accepts(&single).await {
                    return single;
                }
            }
        }

        self.bisect(working).await
    }

    /// The root visit starts from the verified `working` set and the root
    /// combine either keeps an accepted union or falls back to `working`, so
    /// the set this returns never needs another check.
    async fn bisect(&mut self, working: &ParameterSet) -> ParameterSet {
        let mut tasks = vec![Task::Visit {
            candidate: working.clone(),
            fallback: working.clone(),
            candidate_verified: true,
        }];
        let mut results: Vec<ParameterSet> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit {
                    candidate,
                    fallback,
                    candidate_verified,
                } => {
                    if candidate.len() <= 1 {
                        let accepted = candidate_verified || self.accepts(&candidate).await;
                        results.push(if accepted && !candidate.is_empty() {
                            candidate
                        } else {
                            fallback
                        });
                        continue;
                    }

                    let (first, second) = candidate.split_halves();
                    if self.accepts(&second).await {
                        tasks.push(Task::Visit {
                            candidate: second.clone(),
                            fallback: second,
                            candidate_verified: true,
                        });
                    } else if self.accepts(&first).await {
                        tasks.push(Task::Visit {
                            candidate: first.clone(),
                            fallback: first,
                            candidate_verified: true,
                        });
                    } else {
                        // LIFO: `first` is visited before `second`.
                        tasks.push(Task::Combine { candidate });
                        tasks.push(Task::Visit {
                            candidate: second,
                            fallback: fallback.clone(),
                            candidate_verified: false,
                        });
                        tasks.push(Task::Visit {
                            candidate: first,
                            fallback,
                            candidate_verified: false,
                        });
                    }
                }
                Task::Combine { candidate } => {
                    let (second, first) = match (results.pop(), results.pop()) {
                        (Some(second), Some(first)) => (second, first),
                        _ => {
                            results.push(candidate);
                            continue;
                        }
                    };
                    let union = first.union(&second);
                    if self.accepts(&union).await {
                        results.push(union);
                    } else {
                        warn!(
                            target_path = %self.target_path.display(),
                            union = %union,
                            "combined halves rejected, falling back to the unsplit set"
                        );
                        results.push(candidate);
                    }
                }
            }
        }

        results.pop().unwrap_or_else(|| working.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedOracle;
    use serde_json::json;

    fn letters(keys: &[&str]) -> ParameterSet {
        keys.iter()
            .map(|k| (k.to_string(), json!(true)))
            .collect()
    }

    #[tokio::test]
    async fn test_small_sets_returned_unchanged() {
        let oracle = ScriptedOracle::always_accept();
        let working = letters(&["a", "b"]);
        let out = minimize(&oracle, Path::new("/c"), &working).await;
        assert_eq!(out.params, working);
        assert_eq!(out.calls, 0);
    }

    #[tokio::test]
    async fn test_first_sorted_singleton_wins() {
        let oracle = ScriptedOracle::new(|p| p.contains_key("c") || p.contains_key("d"));
        let working = letters(&["d", "c", "b", "a"]);
        let out = minimize(&oracle, Path::new("/c"), &working).await;
        assert_eq!(out.params, letters(&["c"]));
        // a, b, c
        assert_eq!(out.calls, 3);
    }

    #[tokio::test]
    async fn test_bisection_narrows_to_second_half_pair() {
        let oracle = ScriptedOracle::requires(letters(&["e", "f"]));
        let working = letters(&["a", "b", "c", "d", "e", "f"]);
        let out = minimize(&oracle, Path::new("/c"), &working).await;
        assert_eq!(out.params, letters(&["e", "f"]));
        // 6 singles, {d,e,f}, {e,f}, {f}, {e}, then {e}, {f} again and the union
        assert_eq!(out.calls, 13);
    }

    #[tokio::test]
    async fn test_bisection_combines_across_halves() {
        let oracle = ScriptedOracle::requires(letters(&["b", "c", "d"]));
        let working = letters(&["a", "b", "c", "d"]);
        let out = minimize(&oracle, Path::new("/c"), &working).await;
        // No singleton or half passes, so every level falls back to the
        // working set: 4 singles, 2 halves, 5 per half pair, the root union.
        assert_eq!(out.params, letters(&["a", "b", "c", "d"]));
        assert_eq!(out.calls, 17);
    }

    #[tokio::test]
    async fn test_union_failure_falls_back_to_working_set() {
        // Non-monotone validator: each half narrows to an accepted pair, but
        // the union of the two pairs is rejected.
        let full = letters(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let accepted = [full.clone(), letters(&["c", "d"]), letters(&["g", "h"])];
        let oracle = ScriptedOracle::new(move |p| accepted.contains(p));
        let out = minimize(&oracle, Path::new("/c"), &full).await;
        assert_eq!(out.params, full);
        // 8 singles, 2 halves, 6 per half, the rejected root union, no re-check
        assert_eq!(out.calls, 23);
    }

    #[tokio::test]
    async fn test_result_is_accepted_by_oracle() {
        for required in [vec!["a"], vec!["b", "e"], vec!["a", "c", "f"], vec!["d", "e", "f", "g"]] {
            let oracle = ScriptedOracle::requires(letters(&required));
            let working = letters(&["a", "b", "c", "d", "e", "f", "g"]);
            let out = minimize(&oracle, Path::new("/c"), &working).await;
            assert!(out.params.is_subset_of(&working));
            assert!(oracle.invoke(Path::new("/c"), &out.params).await.passed());
        }
    }
}
