//! Target preparation: locating or unpacking a chart, and the cheap static
//! inspection used to pick targeted combinations.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_yaml::Value;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::{SetupError, Target, TargetClassification};

/// A chart directory ready for validation.
///
/// When the target was an archive, the unpacked copy lives in a private
/// scratch directory that is removed when this value is dropped.
#[derive(Debug)]
pub struct PreparedTarget {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl PreparedTarget {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the chart was unpacked from an archive.
    pub fn is_extracted(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Upper bound on unpacking one archive.
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);

/// Use a chart directory in place, or unpack a `.tgz` archive.
pub async fn prepare_target(target_id: &str, path: &Path) -> Result<PreparedTarget, SetupError> {
    prepare_target_within(target_id, path, EXTRACT_TIMEOUT).await
}

/// [`prepare_target`] with an explicit bound on `tar`. The child is killed
/// when the bound elapses.
pub async fn prepare_target_within(
    target_id: &str,
    path: &Path,
    limit: Duration,
) -> Result<PreparedTarget, SetupError> {
    if !path.exists() {
        return Err(SetupError::TargetMissing(path.to_path_buf()));
    }
    if path.is_dir() {
        return Ok(PreparedTarget {
            path: path.to_path_buf(),
            scratch: None,
        });
    }

    let scratch = tempfile::Builder::new()
        .prefix(&format!("chartsolve-{}-", scratch_label(target_id)))
        .tempdir()?;

    let child = Command::new("tar")
        .arg("-xzf")
        .arg(path)
        .arg("-C")
        .arg(scratch.path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SetupError::Extraction {
            path: path.to_path_buf(),
            reason: format!("failed to launch tar: {e}"),
        })?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| SetupError::Extraction {
            path: path.to_path_buf(),
            reason: format!("tar failed: {e}"),
        })?,
        Err(_) => {
            warn!(target_id = %target_id, limit_secs = limit.as_secs(), "tar timed out");
            return Err(SetupError::Extraction {
                path: path.to_path_buf(),
                reason: format!("tar timed out after {}s", limit.as_secs()),
            });
        }
    };

    if !output.status.success() {
        return Err(SetupError::Extraction {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let root = locate_chart_root(scratch.path())?
        .ok_or_else(|| SetupError::NoChartDirectory(path.to_path_buf()))?;
    debug!(target_id = %target_id, root = %root.display(), "unpacked target");

    Ok(PreparedTarget {
        path: root,
        scratch: Some(scratch),
    })
}

fn scratch_label(target_id: &str) -> String {
    target_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// The single top-level directory, else the unique directory holding
/// `Chart.yaml`, else `root` itself. `None` when nothing was unpacked.
fn locate_chart_root(root: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(root)? {
        entries.push(entry?.path());
    }
    if entries.is_empty() {
        return Ok(None);
    }

    let dirs: Vec<&PathBuf> = entries.iter().filter(|p| p.is_dir()).collect();
    if entries.len() == 1 && dirs.len() == 1 {
        return Ok(Some(dirs[0].clone()));
    }

    let charts: Vec<&PathBuf> = dirs
        .iter()
        .copied()
        .filter(|d| d.join("Chart.yaml").is_file())
        .collect();
    if charts.len() == 1 {
        return Ok(Some(charts[0].clone()));
    }

    Ok(Some(root.to_path_buf()))
}

/// Classify a chart directory from `Chart.yaml` and `values.yaml`.
///
/// Unreadable or unparsable files count as absent.
pub fn classify_chart(chart_dir: &Path) -> TargetClassification {
    if let Some(chart) = read_yaml(&chart_dir.join("Chart.yaml")) {
        if mentions_bitnami(&chart) {
            return TargetClassification::Bitnami;
        }
    }
    match read_yaml(&chart_dir.join("values.yaml")) {
        Some(values) => classify_image_field(&values),
        None => TargetClassification::Standard,
    }
}

fn read_yaml(path: &Path) -> Option<Value> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_yaml::from_str(&text) {
        Ok(doc) => Some(doc),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unparsable yaml");
            None
        }
    }
}

fn contains_bitnami(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| s.to_lowercase().contains("bitnami"))
}

/// A `sources` entry or a maintainer `name`/`email` names bitnami.
fn mentions_bitnami(chart: &Value) -> bool {
    let listed = |key: &str| {
        chart
            .get(key)
            .and_then(Value::as_sequence)
            .map(|items| items.iter())
            .into_iter()
            .flatten()
    };
    listed("sources").any(|source| contains_bitnami(Some(source)))
        || listed("maintainers").any(|m| {
            contains_bitnami(m.get("name")) || contains_bitnami(m.get("email"))
        })
}

fn classify_image_field(values: &Value) -> TargetClassification {
    match values.get("image") {
        Some(Value::Mapping(image)) if image.contains_key("registry") => {
            TargetClassification::StandardMap
        }
        Some(Value::String(_)) => TargetClassification::StandardString,
        _ => TargetClassification::Standard,
    }
}

const KNOWN_PROVIDERS: &[&str] = &[
    "bitnami",
    "grafana",
    "elastic",
    "prometheus",
    "jetstack",
    "apache",
    "harbor",
    "kong",
    "istio",
    "linkerd",
    "argo",
    "cert-manager",
];

/// Provider of a target: the `repo/` prefix of its id, else a known provider
/// name contained in the id.
pub fn extract_provider(target_id: &str) -> Option<String> {
    if let Some((prefix, _)) = target_id.split_once('/') {
        return Some(prefix.to_string());
    }
    let lowered = target_id.to_lowercase();
    KNOWN_PROVIDERS
        .iter()
        .find(|p| lowered.contains(**p))
        .map(|p| p.to_string())
}

/// Archive suffixes recognised by [`discover_targets`].
const ARCHIVE_SUFFIXES: [&str; 2] = [".tgz", ".tar.gz"];

/// Find targets under `root`: chart archives and directories holding
/// `Chart.yaml`, either directly or one level down in a provider directory.
///
/// Ids are the path relative to `root` without the archive suffix, so
/// `root/bitnami/nginx-15.0.0.tgz` becomes `bitnami/nginx-15.0.0`. The result
/// is sorted by id.
pub fn discover_targets(root: &Path) -> std::io::Result<Vec<Target>> {
    let mut targets = Vec::new();
    for entry in sorted_entries(root)? {
        match target_name(&entry) {
            Some(name) => targets.push(Target::new(name, entry)),
            None if entry.is_dir() => {
                let Some(provider) = entry.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                for nested in sorted_entries(&entry)? {
                    if let Some(name) = target_name(&nested) {
                        targets.push(Target::new(format!("{provider}/{name}"), nested));
                    }
                }
            }
            None => {}
        }
    }
    targets.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(targets)
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Target name for a chart directory or archive, `None` for anything else.
fn target_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if path.is_dir() {
        return path.join("Chart.yaml").is_file().then(|| name.to_string());
    }
    ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
