//! chartsolve - minimal override discovery for Helm charts
//!
//! ## Commands
//!
//! - `solve`: search every target for a minimal accepted parameter set
//! - `classify`: classify validator diagnostic text
//! - `report`: rebuild the report from a checkpoint
//! - `compare`: diff two checkpoint or report files

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use chartsolve_core::report::ReportSummary;
use chartsolve_core::{
    build_report, classify, compare_results, discover_targets, load_results,
    render_comparison_md, write_report_json, BatchEngine, BatchStats, CheckpointStore,
    ParameterPassing, ResultMap, SearchStrategy, SolverConfig, Target, REPORT_FILE,
};
use chartsolve_oracle::ValidatorOracle;

#[derive(Parser)]
#[command(name = "chartsolve")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find the minimal value overrides each Helm chart needs to validate", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search targets for minimal accepted parameter sets
    Solve(SolveArgs),

    /// Classify validator output (argument or stdin)
    Classify {
        /// Diagnostic text; read from stdin when omitted
        text: Option<String>,
    },

    /// Rebuild the report from a checkpoint file
    Report {
        /// Checkpoint (or earlier report) to read
        #[arg(long)]
        checkpoint: PathBuf,

        /// Report path (default: solver_results.json beside the checkpoint)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two checkpoint or report files
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// Directory of chart archives and chart directories
    #[arg(long, env = "CHARTSOLVE_TARGETS_DIR")]
    targets_dir: Option<PathBuf>,

    /// Explicit target as id=path (repeatable)
    #[arg(long = "target", value_parser = parse_target)]
    targets: Vec<Target>,

    /// Where the checkpoint and report are written
    #[arg(short, long, env = "CHARTSOLVE_OUTPUT_DIR", default_value = "chartsolve-out")]
    output_dir: PathBuf,

    /// Ignore an existing checkpoint
    #[arg(long)]
    fresh: bool,

    /// Only process the first N targets
    #[arg(long)]
    limit: Option<usize>,

    /// JSON solver configuration file
    #[arg(long, env = "CHARTSOLVE_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

/// Flags that win over the configuration file.
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// Search strategy (binary or exhaustive)
    #[arg(long, env = "CHARTSOLVE_STRATEGY")]
    strategy: Option<SearchStrategy>,

    /// Validator executable
    #[arg(long, env = "CHARTSOLVE_VALIDATOR")]
    validator: Option<String>,

    /// Validator subcommand
    #[arg(long, env = "CHARTSOLVE_VALIDATOR_SUBCOMMAND")]
    subcommand: Option<String>,

    /// Pass parameters as a generated values file instead of --set flags
    #[arg(long)]
    values_file: bool,

    /// Seconds before a validator call is killed
    #[arg(long, env = "CHARTSOLVE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Oracle calls per target outside minimization
    #[arg(long, env = "CHARTSOLVE_MAX_ATTEMPTS")]
    max_attempts: Option<usize>,

    /// Concurrent targets
    #[arg(short, long, env = "CHARTSOLVE_WORKERS")]
    workers: Option<usize>,

    /// Completed targets between checkpoint saves
    #[arg(long, env = "CHARTSOLVE_CHECKPOINT_INTERVAL")]
    checkpoint_interval: Option<usize>,

    /// Registry substituted into registry overrides
    #[arg(long, env = "CHARTSOLVE_TARGET_REGISTRY")]
    target_registry: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut SolverConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(validator) = &self.validator {
            config.validator_binary = validator.clone();
        }
        if let Some(subcommand) = &self.subcommand {
            config.validator_subcommand = subcommand.clone();
        }
        if self.values_file {
            config.parameter_passing = ParameterPassing::ValuesFile;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts_per_target = attempts;
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(interval) = self.checkpoint_interval {
            config.checkpoint_interval = interval;
        }
        if let Some(registry) = &self.target_registry {
            config.target_registry = registry.clone();
        }
    }
}

fn parse_target(raw: &str) -> std::result::Result<Target, String> {
    match raw.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => Ok(Target::new(id, path)),
        _ => Err(format!("expected id=path, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    chartsolve_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Solve(args) => cmd_solve(args).await,
        Commands::Classify { text } => cmd_classify(text),
        Commands::Report { checkpoint, output } => cmd_report(&checkpoint, output.as_deref()),
        Commands::Compare { first, second } => cmd_compare(&first, &second),
    }
}

fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<SolverConfig> {
    let mut config = match path {
        Some(path) => SolverConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => SolverConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate().context("Invalid solver configuration")?;
    Ok(config)
}

fn collect_targets(dir: Option<&Path>, explicit: Vec<Target>) -> Result<Vec<Target>> {
    let mut targets = explicit;
    if let Some(dir) = dir {
        let found = discover_targets(dir)
            .with_context(|| format!("Failed to scan targets in {:?}", dir))?;
        targets.extend(found);
    }
    Ok(targets)
}

/// Run the search over every target and write checkpoint and report.
async fn cmd_solve(args: SolveArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.overrides)?;

    let mut targets = collect_targets(args.targets_dir.as_deref(), args.targets)?;
    if let Some(limit) = args.limit {
        targets.truncate(limit);
    }
    if targets.is_empty() {
        anyhow::bail!("No targets found: pass --targets-dir or --target id=path");
    }

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {:?}", args.output_dir))?;
    let store = CheckpointStore::in_dir(&args.output_dir);
    let existing = if args.fresh {
        ResultMap::new()
    } else {
        store
            .load()
            .context("Failed to read checkpoint (use --fresh to start over)")?
    };

    info!(
        targets = targets.len(),
        checkpointed = existing.len(),
        validator = %config.validator_binary,
        "solving"
    );

    let oracle = Arc::new(ValidatorOracle::from_config(&config));
    let engine = BatchEngine::new(config, oracle, store)?;
    let mut stats = BatchStats::new();
    let results = engine.run(&targets, existing, &mut stats).await?;

    let report = build_report(&results);
    let report_path = args.output_dir.join(REPORT_FILE);
    write_report_json(&report_path, &report)?;

    print_summary(&report.summary);
    println!(
        "Resumed: {}  Oracle calls: {}",
        stats.resumed, stats.oracle_calls
    );
    println!("Checkpoint: {}", engine.store().path().display());
    println!("Report:     {}", report_path.display());
    Ok(())
}

fn cmd_classify(text: Option<String>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    let category = classify(&text);
    println!("{}\t{}", category.as_str(), category.description());
    Ok(())
}

fn cmd_report(checkpoint: &Path, output: Option<&Path>) -> Result<()> {
    let results = load_results(checkpoint)?;
    let report = build_report(&results);
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| checkpoint.with_file_name(REPORT_FILE));
    write_report_json(&output, &report)?;

    print_summary(&report.summary);
    println!("Report: {}", output.display());
    Ok(())
}

fn cmd_compare(first: &Path, second: &Path) -> Result<()> {
    let a = load_results(first)?;
    let b = load_results(second)?;
    print!("{}", render_comparison_md(&compare_results(&a, &b)));
    Ok(())
}

fn print_summary(summary: &ReportSummary) {
    println!(
        "Targets: {}  Solved: {}  Unsolved: {}  Success rate: {:.1}%",
        summary.total, summary.solved, summary.unsolved, summary.success_rate
    );
    if !summary.error_categories.is_empty() {
        println!("Error categories:");
        for (category, count) in &summary.error_categories {
            println!("  {:<24} {}", category.as_str(), count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        let target = parse_target("bitnami/nginx=/charts/nginx-15.0.0.tgz").unwrap();
        assert_eq!(target.id, "bitnami/nginx");
        assert_eq!(target.path, PathBuf::from("/charts/nginx-15.0.0.tgz"));

        assert!(parse_target("no-path").is_err());
        assert!(parse_target("=/charts/x").is_err());
        assert!(parse_target("id=").is_err());
    }

    #[test]
    fn test_solve_flags_parse() {
        let cli = Cli::try_parse_from([
            "chartsolve",
            "--verbose",
            "solve",
            "--target",
            "a/b=/charts/b",
            "--target",
            "a/c=/charts/c",
            "--strategy",
            "exhaustive",
            "--workers",
            "8",
            "--values-file",
            "--fresh",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Solve(args) = cli.command else {
            panic!("expected solve");
        };
        assert_eq!(args.targets.len(), 2);
        assert!(args.fresh);
        assert_eq!(args.overrides.strategy, Some(SearchStrategy::Exhaustive));

        assert!(Cli::try_parse_from(["chartsolve", "solve", "--strategy", "random"]).is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_workers": 2, "timeout_secs": 30}"#).unwrap();

        let overrides = ConfigOverrides {
            workers: Some(6),
            values_file: true,
            ..ConfigOverrides::default()
        };
        let config = load_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.max_workers, 6);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.parameter_passing, ParameterPassing::ValuesFile);

        let zero = ConfigOverrides {
            workers: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(load_config(None, &zero).is_err());
    }

    #[test]
    fn test_cmd_report_writes_beside_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::in_dir(dir.path());
        let record = chartsolve_core::TargetRecord::worker_failure(
            &Target::new("acme/app", "/charts/app"),
            "boom",
        );
        let mut map = ResultMap::new();
        map.insert("acme/app".to_string(), record);
        store.save(&map).unwrap();

        cmd_report(store.path(), None).unwrap();

        let report_path = dir.path().join(REPORT_FILE);
        assert_eq!(load_results(&report_path).unwrap(), map);
        cmd_compare(store.path(), &report_path).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cmd_solve_with_accepting_validator() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let validator = dir.path().join("validator");
        std::fs::write(&validator, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&validator, std::fs::Permissions::from_mode(0o755)).unwrap();

        let charts = dir.path().join("charts");
        for name in ["alpha", "beta"] {
            let chart = charts.join(name);
            std::fs::create_dir_all(&chart).unwrap();
            std::fs::write(chart.join("Chart.yaml"), format!("name: {name}\n")).unwrap();
        }
        let out = dir.path().join("out");

        let args = SolveArgs {
            targets_dir: Some(charts),
            targets: Vec::new(),
            output_dir: out.clone(),
            fresh: false,
            limit: None,
            config: None,
            overrides: ConfigOverrides {
                validator: Some(validator.display().to_string()),
                ..ConfigOverrides::default()
            },
        };
        cmd_solve(args).await.unwrap();

        let results = load_results(&out.join(REPORT_FILE)).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| r.solved()));
        assert!(CheckpointStore::in_dir(&out).path().is_file());
    }
}
