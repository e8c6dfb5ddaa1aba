//! Outcome of one oracle call.

use serde::{Deserialize, Serialize};

use super::category::ErrorCategory;

/// How the validator process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// Exit code 0.
    Success,
    /// Non-zero exit code.
    ValidateError,
    /// Wall-clock bound exceeded; the parameters are presumed failing.
    TimeoutError,
    /// The process could not be launched or awaited.
    UnknownError,
}

/// Immutable result of a single validator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,

    /// Classifier category; `None` on success.
    pub category: Option<ErrorCategory>,

    /// Captured diagnostics (or a description of the launch failure).
    pub details: String,

    /// Wall-clock duration in seconds.
    pub duration: f64,
}

impl ValidationResult {
    pub fn success(duration: f64) -> Self {
        Self {
            status: ValidationStatus::Success,
            category: None,
            details: "Validation successful".to_string(),
            duration,
        }
    }

    pub fn rejected(category: ErrorCategory, details: impl Into<String>, duration: f64) -> Self {
        Self {
            status: ValidationStatus::ValidateError,
            category: Some(category),
            details: details.into(),
            duration,
        }
    }

    pub fn timed_out(timeout_secs: u64, duration: f64) -> Self {
        Self {
            status: ValidationStatus::TimeoutError,
            category: Some(ErrorCategory::TimeoutError),
            details: format!("Command timed out after {} seconds", timeout_secs),
            duration,
        }
    }

    pub fn launch_failed(details: impl Into<String>, duration: f64) -> Self {
        Self {
            status: ValidationStatus::UnknownError,
            category: Some(ErrorCategory::UnknownError),
            details: details.into(),
            duration,
        }
    }

    /// Whether the validator accepted the target.
    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_has_no_category() {
        let r = ValidationResult::success(0.2);
        assert!(r.passed());
        assert!(r.category.is_none());
    }

    #[test]
    fn test_timeout_is_categorized() {
        let r = ValidationResult::timed_out(60, 60.0);
        assert!(!r.passed());
        assert_eq!(r.status, ValidationStatus::TimeoutError);
        assert_eq!(r.category, Some(ErrorCategory::TimeoutError));
        assert!(r.details.contains("60 seconds"));
    }

    #[test]
    fn test_launch_failure_is_unknown() {
        let r = ValidationResult::launch_failed("No such file or directory", 0.0);
        assert_eq!(r.status, ValidationStatus::UnknownError);
        assert_eq!(r.category, Some(ErrorCategory::UnknownError));
    }
}
