//! Subprocess oracle execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use chartsolve_core::{classify, Oracle, ParameterSet, SolverConfig, ValidationResult};

use crate::command::{ValidatorCommand, ValidatorSettings};

/// Oracle backed by an external validator process.
///
/// Each call spawns one process. Exit code 0 is acceptance; anything else is
/// a rejection whose captured output is classified. A call that outlives the
/// timeout is killed and reported as a timeout.
#[derive(Debug, Clone)]
pub struct ValidatorOracle {
    settings: ValidatorSettings,
}

impl ValidatorOracle {
    pub fn new(settings: ValidatorSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(ValidatorSettings::from_config(config))
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }
}

#[async_trait]
impl Oracle for ValidatorOracle {
    async fn invoke(&self, target_path: &Path, params: &ParameterSet) -> ValidationResult {
        let start = Instant::now();

        let command = match ValidatorCommand::build(&self.settings, target_path, params) {
            Ok(command) => command,
            Err(err) => {
                warn!(target_path = %target_path.display(), error = %err, "could not prepare validator call");
                return ValidationResult::launch_failed(err.to_string(), seconds(start));
            }
        };
        debug!(command = %command.display(), "running validator");

        let child = match Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                warn!(binary = %command.program, error = %err, "failed to launch validator");
                return ValidationResult::launch_failed(
                    format!("failed to launch {}: {}", command.program, err),
                    seconds(start),
                );
            }
        };

        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            // Dropping the timed-out future drops the child, which kills it.
            Err(_) => {
                warn!(
                    target_path = %target_path.display(),
                    timeout_secs = self.settings.timeout_secs,
                    "validator timed out"
                );
                return ValidationResult::timed_out(self.settings.timeout_secs, seconds(start));
            }
            Ok(Err(err)) => {
                warn!(binary = %command.program, error = %err, "failed to collect validator output");
                return ValidationResult::launch_failed(err.to_string(), seconds(start));
            }
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            return ValidationResult::success(seconds(start));
        }

        let details = diagnostics(&output.stdout, &output.stderr);
        ValidationResult::rejected(classify(&details), details, seconds(start))
    }
}

/// Stderr first, then stdout; either may be empty.
fn diagnostics(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let parts: Vec<&str> = [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    parts.join("\n")
}

fn seconds(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}
