//! Solver configuration.
//!
//! One plain, fully serializable value. Workers receive a clone; nothing in
//! the search reads process-global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::candidates::{default_matrix, ParameterMatrix};
use crate::domain::{Result, SolverError};
use crate::strategy::SearchStrategy;

/// How parameters reach the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterPassing {
    /// Repeated `--set key=value` flags.
    #[default]
    SetFlags,
    /// One generated values file passed with `--values`.
    ValuesFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub strategy: SearchStrategy,

    /// Validator executable (looked up on `PATH` when not absolute).
    pub validator_binary: String,

    pub validator_subcommand: String,

    pub parameter_passing: ParameterPassing,

    /// Wall-clock bound per oracle call.
    pub timeout_secs: u64,

    /// Oracle calls allowed per target outside of minimization.
    pub max_attempts_per_target: usize,

    pub max_workers: usize,

    /// Completed targets between checkpoint saves.
    pub checkpoint_interval: usize,

    /// Replaces the `__TARGET_REGISTRY__` placeholder in candidate values.
    pub target_registry: String,

    /// The single highest-value knob.
    pub version_parameter: String,

    pub preferred_version: String,

    /// Versions tried one at a time during the targeted phase.
    pub targeted_versions: Vec<String>,

    pub parameter_matrix: ParameterMatrix,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::Binary,
            validator_binary: "irr".to_string(),
            validator_subcommand: "validate".to_string(),
            parameter_passing: ParameterPassing::SetFlags,
            timeout_secs: 60,
            max_attempts_per_target: 10,
            max_workers: 4,
            checkpoint_interval: 50,
            target_registry: "docker.io".to_string(),
            version_parameter: "kubeVersion".to_string(),
            preferred_version: "1.28.0".to_string(),
            targeted_versions: ["1.23.0", "1.25.0", "1.27.0", "1.28.0"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            parameter_matrix: default_matrix(),
        }
    }
}

impl SolverConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SolverConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("max_workers", self.max_workers == 0),
            ("timeout_secs", self.timeout_secs == 0),
            ("max_attempts_per_target", self.max_attempts_per_target == 0),
            ("checkpoint_interval", self.checkpoint_interval == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(SolverError::InvalidConfig(format!(
                "{name} must be greater than zero"
            )));
        }
        if self.validator_binary.trim().is_empty() {
            return Err(SolverError::InvalidConfig(
                "validator_binary must not be empty".to_string(),
            ));
        }
        if self.version_parameter.trim().is_empty() {
            return Err(SolverError::InvalidConfig(
                "version_parameter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.strategy, SearchStrategy::Binary);
        assert!(config.parameter_matrix.contains_key("kubeVersion"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SolverConfig {
            max_workers: 0,
            ..SolverConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn test_empty_binary_rejected() {
        let config = SolverConfig {
            validator_binary: "  ".to_string(),
            ..SolverConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"strategy": "exhaustive", "parameter_passing": "values_file", "max_workers": 2}}"#
        )
        .unwrap();

        let config = SolverConfig::load(file.path()).unwrap();
        assert_eq!(config.strategy, SearchStrategy::Exhaustive);
        assert_eq!(config.parameter_passing, ParameterPassing::ValuesFile);
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.checkpoint_interval, 50);
        assert_eq!(config.validator_subcommand, "validate");
    }

    #[test]
    fn test_load_rejects_unknown_strategy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"strategy": "random"}}"#).unwrap();
        assert!(matches!(
            SolverConfig::load(file.path()),
            Err(SolverError::Serialization(_))
        ));
    }
}
