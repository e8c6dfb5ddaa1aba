//! Candidate generation: the parameter matrix and the combinations derived
//! from it.
//!
//! Every generator returns its combinations deduplicated by
//! [`ParameterSet`] equality, in first-seen order.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Value};

use crate::config::SolverConfig;
use crate::domain::{ErrorCategory, ParameterSet, TargetClassification};

/// Parameter name -> candidate values. A `None` entry is the "leave unset"
/// choice and is never emitted as a value.
pub type ParameterMatrix = BTreeMap<String, Vec<Option<Value>>>;

/// Marker replaced by [`Substitutions::target_registry`].
pub const TARGET_REGISTRY_PLACEHOLDER: &str = "__TARGET_REGISTRY__";

/// Knobs that commonly unblock Helm chart validation.
pub fn default_matrix() -> ParameterMatrix {
    let mut matrix = ParameterMatrix::new();
    matrix.insert(
        "kubeVersion".to_string(),
        std::iter::once(None)
            .chain(
                ["1.28.0", "1.27.0", "1.25.0", "1.23.0", "1.19.0"]
                    .iter()
                    .map(|v| Some(json!(v))),
            )
            .collect(),
    );
    matrix.insert(
        "global.imageRegistry".to_string(),
        vec![None, Some(json!(TARGET_REGISTRY_PLACEHOLDER))],
    );
    matrix.insert(
        "global.security.allowInsecureImages".to_string(),
        vec![None, Some(json!(true))],
    );
    matrix.insert(
        "persistence.enabled".to_string(),
        vec![None, Some(json!(false)), Some(json!(true))],
    );
    matrix.insert(
        "auth.enabled".to_string(),
        vec![None, Some(json!(false)), Some(json!(true))],
    );
    matrix.insert(
        "fullnameOverride".to_string(),
        vec![None, Some(json!("release-name"))],
    );
    matrix.insert("installCRDs".to_string(), vec![None, Some(json!(true))]);
    matrix.insert(
        "serviceAccount.create".to_string(),
        vec![None, Some(json!(true))],
    );
    matrix
}

/// Run-time values substituted into candidate values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
    pub target_registry: String,
}

impl Substitutions {
    pub fn new(target_registry: impl Into<String>) -> Self {
        Self {
            target_registry: target_registry.into(),
        }
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(config.target_registry.clone())
    }

    /// Replace placeholders in every string, at any depth.
    pub fn apply(&self, value: &Value) -> Value {
        match value {
            Value::String(s) if s.contains(TARGET_REGISTRY_PLACEHOLDER) => {
                Value::String(s.replace(TARGET_REGISTRY_PLACEHOLDER, &self.target_registry))
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.apply(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Substituted non-null values per parameter, dropping parameters that
/// have none.
fn concrete_values(matrix: &ParameterMatrix, subs: &Substitutions) -> Vec<(String, Vec<Value>)> {
    matrix
        .iter()
        .filter_map(|(name, values)| {
            let concrete: Vec<Value> = values
                .iter()
                .flatten()
                .filter(|v| !v.is_null())
                .map(|v| subs.apply(v))
                .collect();
            (!concrete.is_empty()).then(|| (name.clone(), concrete))
        })
        .collect()
}

/// The "kitchen sink" set: the first non-null value of every parameter.
pub fn all_params(matrix: &ParameterMatrix, subs: &Substitutions) -> ParameterSet {
    concrete_values(matrix, subs)
        .into_iter()
        .filter_map(|(name, values)| values.into_iter().next().map(|v| (name, v)))
        .collect()
}

/// Every single-parameter set, then (when `max_size >= 2`) every pair of a
/// `version_parameter` value with one value of another parameter.
///
/// Growth is linear in the matrix size per version value.
pub fn pairwise_combinations(
    matrix: &ParameterMatrix,
    subs: &Substitutions,
    version_parameter: &str,
    max_size: usize,
) -> Vec<ParameterSet> {
    let concrete = concrete_values(matrix, subs);
    let mut combos = Vec::new();

    if max_size >= 1 {
        for (name, values) in &concrete {
            for value in values {
                combos.push(ParameterSet::new().with(name.clone(), value.clone()));
            }
        }
    }

    if max_size >= 2 {
        if let Some((_, versions)) = concrete.iter().find(|(name, _)| name == version_parameter) {
            for version in versions {
                for (name, values) in concrete.iter().filter(|(n, _)| n != version_parameter) {
                    for value in values {
                        combos.push(
                            ParameterSet::new()
                                .with(version_parameter, version.clone())
                                .with(name.clone(), value.clone()),
                        );
                    }
                }
            }
        }
    }

    dedup(combos)
}

/// Hand-ranked combinations for one target, keyed off its id, layout and
/// the error categories seen so far.
pub fn targeted_combinations(
    target_id: &str,
    classification: TargetClassification,
    provider: Option<&str>,
    seen: &[ErrorCategory],
    config: &SolverConfig,
) -> Vec<ParameterSet> {
    let registry = config.target_registry.as_str();
    let placeholder_image = format!("{registry}/placeholder:1.0.0");
    let pinned = || {
        ParameterSet::new().with(
            config.version_parameter.clone(),
            json!(config.preferred_version),
        )
    };
    let mut combos = Vec::new();

    for version in &config.targeted_versions {
        combos.push(ParameterSet::new().with(config.version_parameter.clone(), json!(version)));
    }

    combos.push(ParameterSet::new().with("global.imageRegistry", json!(registry)));
    combos.push(ParameterSet::new().with("image.registry", json!(registry)));
    combos.push(ParameterSet::new().with("image", json!(placeholder_image)));

    combos.push(ParameterSet::new().with("global.security.allowInsecureImages", json!(true)));
    combos.push(ParameterSet::new().with("allowInsecureImages", json!(true)));

    if seen.contains(&ErrorCategory::TemplateError) {
        combos.push(
            pinned()
                .with("persistence.enabled", json!(false))
                .with("serviceAccount.create", json!(true)),
        );
    }
    if seen.contains(&ErrorCategory::SchemaError) {
        combos.push(pinned().with("installCRDs", json!(true)));
    }

    let bitnami_style = pinned()
        .with("global.imageRegistry", json!(registry))
        .with("global.security.allowInsecureImages", json!(true));
    if provider == Some("bitnami") {
        combos.push(bitnami_style.clone());
    }
    match classification {
        TargetClassification::Bitnami => combos.push(bitnami_style),
        TargetClassification::StandardMap => {
            combos.push(pinned().with("image.registry", json!(registry)))
        }
        TargetClassification::StandardString => {
            combos.push(pinned().with("image", json!(placeholder_image)))
        }
        TargetClassification::Standard | TargetClassification::Unclassified => {}
    }

    let lowered = target_id.to_lowercase();
    for component in ["loki", "tempo", "postgresql", "redis", "mongodb"] {
        if !lowered.contains(component) {
            continue;
        }
        let combo = match component {
            "loki" => pinned()
                .with("lokiAddress", json!("http://loki:3100"))
                .with("loki.storage.type", json!("filesystem")),
            "tempo" => pinned()
                .with("tempoAddress.push", json!("http://tempo:3200"))
                .with("tempoAddress.query", json!("http://tempo:3200")),
            _ => pinned()
                .with(format!("global.{component}.auth.enabled"), json!(false))
                .with("persistence.enabled", json!(false)),
        };
        combos.push(combo);
    }

    dedup(combos)
}

fn dedup(combos: Vec<ParameterSet>) -> Vec<ParameterSet> {
    let mut seen = HashSet::new();
    combos
        .into_iter()
        .filter(|combo| seen.insert(combo.clone()))
        .collect()
}
