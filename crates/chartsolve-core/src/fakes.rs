//! In-memory oracle fakes (testing only).
//!
//! [`ScriptedOracle`] accepts or rejects parameter sets with a predicate,
//! counts every call and can inject timeouts or canned diagnostics, so the
//! search can be exercised without a validator binary.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::classifier;
use crate::domain::{ParameterSet, ValidationResult};
use crate::oracle::Oracle;

type Predicate = Box<dyn Fn(&Path, &ParameterSet) -> bool + Send + Sync>;

/// Predicate-driven oracle with call accounting.
pub struct ScriptedOracle {
    accepts: Predicate,
    timeout_when: Option<Predicate>,
    diagnostic: String,
    calls: AtomicU32,
    log: Mutex<Vec<(PathBuf, ParameterSet)>>,
}

impl ScriptedOracle {
    /// Accept exactly the sets for which `accepts` holds, for any target.
    pub fn new(accepts: impl Fn(&ParameterSet) -> bool + Send + Sync + 'static) -> Self {
        Self::per_target(move |_, params| accepts(params))
    }

    /// Accept based on both target path and parameters.
    pub fn per_target(
        accepts: impl Fn(&Path, &ParameterSet) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            accepts: Box::new(accepts),
            timeout_when: None,
            diagnostic: "Error: validation failed".to_string(),
            calls: AtomicU32::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Accept every set.
    pub fn always_accept() -> Self {
        Self::new(|_| true)
    }

    /// Reject every set.
    pub fn always_reject() -> Self {
        Self::new(|_| false)
    }

    /// Accept any set that contains `required` (same keys, same values).
    pub fn requires(required: ParameterSet) -> Self {
        Self::new(move |params| required.is_subset_of(params))
    }

    /// Diagnostic text returned on rejection; it is classified like real
    /// validator output.
    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = diagnostic.into();
        self
    }

    /// Report a timeout instead of an answer when `when` holds.
    pub fn with_timeout_when(
        mut self,
        when: impl Fn(&ParameterSet) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.timeout_when = Some(Box::new(move |_, params| when(params)));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `(target, params)` pair seen, in call order.
    pub fn history(&self) -> Vec<(PathBuf, ParameterSet)> {
        self.log.lock().unwrap().clone()
    }

    /// Calls made against one target path.
    pub fn calls_for(&self, target_path: &Path) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path == target_path)
            .count()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn invoke(&self, target_path: &Path, params: &ParameterSet) -> ValidationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push((target_path.to_path_buf(), params.clone()));

        if let Some(when) = &self.timeout_when {
            if when(target_path, params) {
                return ValidationResult::timed_out(60, 60.0);
            }
        }
        if (self.accepts)(target_path, params) {
            ValidationResult::success(0.01)
        } else {
            ValidationResult::rejected(
                classifier::classify(&self.diagnostic),
                self.diagnostic.clone(),
                0.01,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCategory, ValidationStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_requires_accepts_supersets() {
        let oracle = ScriptedOracle::requires(ParameterSet::new().with("a", json!(1)));
        let path = Path::new("/charts/x");
        assert!(oracle.invoke(path, &ParameterSet::new().with("a", json!(1)).with("b", json!(2))).await.passed());
        assert!(!oracle.invoke(path, &ParameterSet::new().with("a", json!(2))).await.passed());
        assert_eq!(oracle.calls(), 2);
        assert_eq!(oracle.calls_for(path), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_classified() {
        let oracle = ScriptedOracle::always_reject()
            .with_diagnostic("Error: required value \"global.storageClass\" is missing");
        let result = oracle.invoke(Path::new("/c"), &ParameterSet::new()).await;
        assert_eq!(result.status, ValidationStatus::ValidateError);
        assert_eq!(result.category, Some(ErrorCategory::RequiredValueError));
    }

    #[tokio::test]
    async fn test_timeout_injection() {
        let oracle = ScriptedOracle::always_accept().with_timeout_when(|p| p.is_empty());
        let result = oracle.invoke(Path::new("/c"), &ParameterSet::new()).await;
        assert_eq!(result.status, ValidationStatus::TimeoutError);
        assert_eq!(result.category, Some(ErrorCategory::TimeoutError));
    }
}
