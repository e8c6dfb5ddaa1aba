use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::checkpoint::ResultMap;
use crate::domain::{ErrorCategory, ParameterSet, TargetOutcome};

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Default report file name inside an output directory.
pub const REPORT_FILE: &str = "solver_results.json";

/// Summary section of the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub total: usize,
    pub solved: usize,
    pub unsolved: usize,
    /// Percent of targets with a minimal parameter set.
    pub success_rate: f64,
    pub error_categories: BTreeMap<ErrorCategory, usize>,
    pub outcomes: BTreeMap<TargetOutcome, usize>,
}

/// Which parameters the corpus needed, across all minimal sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterStatistics {
    /// Parameter name -> number of minimal sets containing it.
    pub required_parameters: BTreeMap<String, usize>,
    /// Sorted key-set ("shape") -> number of minimal sets with that shape.
    pub parameter_combinations: BTreeMap<String, usize>,
    /// Parameter name -> value text -> count.
    pub parameter_values: BTreeMap<String, BTreeMap<String, usize>>,
}

/// The report artifact written at batch end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub targets: ResultMap,
    pub parameter_statistics: ParameterStatistics,
}

/// Differences between two result maps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultComparison {
    pub only_in_first: Vec<String>,
    pub only_in_second: Vec<String>,
    /// Target id -> (first minimal set, second minimal set).
    pub param_differences: BTreeMap<String, (Option<ParameterSet>, Option<ParameterSet>)>,
    pub success_rate_first: f64,
    pub success_rate_second: f64,
}

/// Percent of records with a minimal parameter set; 0 for an empty map.
pub fn success_rate(results: &ResultMap) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let solved = results.values().filter(|r| r.solved()).count();
    solved as f64 * 100.0 / results.len() as f64
}

pub fn summarize(results: &ResultMap) -> ReportSummary {
    let mut error_categories = BTreeMap::new();
    let mut outcomes = BTreeMap::new();
    for record in results.values() {
        *outcomes.entry(record.outcome).or_insert(0) += 1;
        for category in &record.error_categories {
            *error_categories.entry(*category).or_insert(0) += 1;
        }
    }
    let solved = results.values().filter(|r| r.solved()).count();
    ReportSummary {
        total: results.len(),
        solved,
        unsolved: results.len() - solved,
        success_rate: success_rate(results),
        error_categories,
        outcomes,
    }
}

pub fn parameter_statistics(results: &ResultMap) -> ParameterStatistics {
    let mut stats = ParameterStatistics::default();
    for minimal in results.values().filter_map(|r| r.minimal_success_params.as_ref()) {
        *stats
            .parameter_combinations
            .entry(minimal.shape())
            .or_insert(0) += 1;
        for (name, value) in minimal.iter() {
            *stats.required_parameters.entry(name.clone()).or_insert(0) += 1;
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            *stats
                .parameter_values
                .entry(name.clone())
                .or_default()
                .entry(text)
                .or_insert(0) += 1;
        }
    }
    stats
}

/// Build the report for a result map.
pub fn build_report(results: &ResultMap) -> SolverReport {
    SolverReport {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        summary: summarize(results),
        targets: results.clone(),
        parameter_statistics: parameter_statistics(results),
    }
}

/// Group target ids by identical minimal sets. Keys are the sets' JSON text.
pub fn group_by_minimal_params(results: &ResultMap) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (id, record) in results {
        if let Some(minimal) = &record.minimal_success_params {
            let key = serde_json::to_string(minimal).unwrap_or_else(|_| minimal.to_string());
            groups.entry(key).or_default().push(id.clone());
        }
    }
    groups
}

pub fn compare_results(first: &ResultMap, second: &ResultMap) -> ResultComparison {
    let only_in_first = first
        .keys()
        .filter(|id| !second.contains_key(*id))
        .cloned()
        .collect();
    let only_in_second = second
        .keys()
        .filter(|id| !first.contains_key(*id))
        .cloned()
        .collect();
    let param_differences = first
        .iter()
        .filter_map(|(id, a)| {
            let b = second.get(id)?;
            (a.minimal_success_params != b.minimal_success_params).then(|| {
                (
                    id.clone(),
                    (
                        a.minimal_success_params.clone(),
                        b.minimal_success_params.clone(),
                    ),
                )
            })
        })
        .collect();
    ResultComparison {
        only_in_first,
        only_in_second,
        param_differences,
        success_rate_first: success_rate(first),
        success_rate_second: success_rate(second),
    }
}

/// Write the report in pretty JSON format.
pub fn write_report_json(path: &Path, report: &SolverReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize solver report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Load a result map from either a report (`targets`, or legacy `charts`)
/// or a bare checkpoint file.
pub fn load_results(path: &Path) -> Result<ResultMap> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let mut doc: Value =
        serde_json::from_str(&raw).with_context(|| format!("parse {:?}", path))?;
    let wrapped = if doc.get("schema_version").is_some() && doc.get("targets").is_some() {
        Some("targets")
    } else if doc.get("summary").is_some() && doc.get("charts").is_some() {
        Some("charts")
    } else {
        None
    };
    let map_value = match wrapped {
        Some(key) => doc[key].take(),
        None => doc,
    };
    serde_json::from_value(map_value).with_context(|| format!("decode results in {:?}", path))
}

/// Render a comparison as short markdown for terminals and PR comments.
pub fn render_comparison_md(cmp: &ResultComparison) -> String {
    let mut out = String::new();
    out.push_str("# Result Comparison\n\n");
    out.push_str(&format!(
        "- success rate: {:.1}% -> {:.1}%\n- only in first: {}\n- only in second: {}\n- changed minimal sets: {}\n",
        cmp.success_rate_first,
        cmp.success_rate_second,
        cmp.only_in_first.len(),
        cmp.only_in_second.len(),
        cmp.param_differences.len()
    ));
    if !cmp.param_differences.is_empty() {
        out.push_str("\n## Changed\n");
        for (id, (a, b)) in &cmp.param_differences {
            let show = |p: &Option<ParameterSet>| {
                p.as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "none".to_string())
            };
            out.push_str(&format!("- `{}`: {} -> {}\n", id, show(a), show(b)));
        }
    }
    out
}
