//! Validator command lines.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use chartsolve_core::{ParameterPassing, ParameterSet, SolverConfig};

/// Errors while preparing a validator invocation.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("validator binary is empty")]
    EmptyBinary,

    #[error("failed to write values file: {0}")]
    ValuesFile(#[from] std::io::Error),

    #[error("failed to encode values file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The part of the solver configuration the subprocess oracle needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Executable (looked up on `PATH` when not absolute).
    pub binary: String,

    /// Subcommand placed before the chart flags.
    pub subcommand: String,

    pub parameter_passing: ParameterPassing,

    /// Wall-clock bound per call, in seconds.
    pub timeout_secs: u64,
}

impl ValidatorSettings {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            binary: config.validator_binary.clone(),
            subcommand: config.validator_subcommand.clone(),
            parameter_passing: config.parameter_passing,
            timeout_secs: config.timeout_secs,
        }
    }
}

/// One ready-to-spawn validator invocation.
///
/// In values-file mode the generated file lives as long as this value and
/// is removed when it is dropped.
#[derive(Debug)]
pub struct ValidatorCommand {
    pub program: String,
    pub args: Vec<String>,
    values_file: Option<NamedTempFile>,
}

impl ValidatorCommand {
    /// `<binary> <subcommand> --chart-path <path>` followed by either one
    /// `--set key=value` per flattened parameter or `--values <file>`.
    pub fn build(
        settings: &ValidatorSettings,
        chart_path: &Path,
        params: &ParameterSet,
    ) -> Result<Self, CommandError> {
        if settings.binary.trim().is_empty() {
            return Err(CommandError::EmptyBinary);
        }

        let mut args = Vec::new();
        if !settings.subcommand.is_empty() {
            args.push(settings.subcommand.clone());
        }
        args.push("--chart-path".to_string());
        args.push(chart_path.display().to_string());

        let mut values_file = None;
        if !params.is_empty() {
            match settings.parameter_passing {
                ParameterPassing::SetFlags => {
                    for pair in params.to_set_args() {
                        args.push("--set".to_string());
                        args.push(pair);
                    }
                }
                ParameterPassing::ValuesFile => {
                    let file = write_values_file(params)?;
                    args.push("--values".to_string());
                    args.push(file.path().display().to_string());
                    values_file = Some(file);
                }
            }
        }

        Ok(Self {
            program: settings.binary.clone(),
            args,
            values_file,
        })
    }

    /// Path of the generated values file, if any.
    pub fn values_path(&self) -> Option<PathBuf> {
        self.values_file.as_ref().map(|f| f.path().to_path_buf())
    }

    /// The full command line, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn write_values_file(params: &ParameterSet) -> Result<NamedTempFile, CommandError> {
    let body = serde_json::to_vec_pretty(&params.to_values_document())?;
    let mut file = tempfile::Builder::new()
        .prefix("chartsolve-values-")
        .suffix(".yaml")
        .tempfile()?;
    file.write_all(&body)?;
    file.flush()?;
    Ok(file)
}
