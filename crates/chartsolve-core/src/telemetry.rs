//! Tracing initialisation for chartsolve binaries.
//!
//! Logs go to stderr so that commands printing results (`classify`, `compare`)
//! keep stdout clean.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "CHARTSOLVE_LOG";

/// Build the filter: `CHARTSOLVE_LOG`, then `RUST_LOG`, then `level` for the
/// chartsolve crates only.
pub fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "warn,chartsolve={level},chartsolve_core={level},chartsolve_oracle={level}"
            ))
        })
}

/// Install the global subscriber. `json` selects newline-delimited JSON.
///
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = build_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }

    #[test]
    fn test_default_filter_mentions_level() {
        if std::env::var(LOG_ENV).is_ok() || std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = build_filter(Level::DEBUG).to_string();
        assert!(filter.contains("chartsolve_core=debug"));
    }
}
