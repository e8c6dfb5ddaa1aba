//! Parameter sets: the unit of search.
//!
//! A [`ParameterSet`] maps dotted value paths (`global.imageRegistry`) to JSON
//! values. Keys are kept sorted, which makes every split and every iteration
//! deterministic. Equality and hashing go through the canonical
//! `(key, stringified value)` pairs because `serde_json::Value` is not `Hash`.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// An ordered set of value overrides under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, Value>);

impl ParameterSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(name, value)` pairs. Later duplicates win.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Insert or replace one parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parameter names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// A one-element set holding `name` with its current value.
    pub fn singleton(&self, name: &str) -> Option<ParameterSet> {
        self.0
            .get_key_value(name)
            .map(|(k, v)| ParameterSet::from_pairs([(k.clone(), v.clone())]))
    }

    /// Split into `(first, second)` by position: the first `len / 2` keys and
    /// the rest. The split is positional only; it carries no meaning about
    /// which parameters belong together.
    pub fn split_halves(&self) -> (ParameterSet, ParameterSet) {
        let mid = self.0.len() / 2;
        let mut first = ParameterSet::new();
        let mut second = ParameterSet::new();
        for (idx, (k, v)) in self.0.iter().enumerate() {
            if idx < mid {
                first.0.insert(k.clone(), v.clone());
            } else {
                second.0.insert(k.clone(), v.clone());
            }
        }
        (first, second)
    }

    /// Union of two sets. Values from `other` win on key collisions.
    pub fn union(&self, other: &ParameterSet) -> ParameterSet {
        let mut merged = self.clone();
        for (k, v) in &other.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Whether every key of `self` is present in `other` with an equal value.
    pub fn is_subset_of(&self, other: &ParameterSet) -> bool {
        self.0
            .iter()
            .all(|(k, v)| other.0.get(k).is_some_and(|ov| ov == v))
    }

    /// Sorted `(key, stringified value)` pairs used for equality and hashing.
    pub fn canonical_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), canonical_value(v)))
            .collect()
    }

    /// Stable SHA-256 digest of the canonical pairs (hex, 16 chars).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (k, v) in self.canonical_pairs() {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())[..16].to_string()
    }

    /// The "shape" of the set: its sorted key names joined by `,`.
    ///
    /// Used to histogram which combinations of parameters charts need,
    /// independent of the values chosen.
    pub fn shape(&self) -> String {
        self.0.keys().cloned().collect::<Vec<_>>().join(",")
    }

    /// Render as `key=value` pairs for repeated `--set` flags.
    ///
    /// Nested mappings are flattened into dotted keys so that the flags and
    /// the values-file form describe the same overrides.
    pub fn to_set_args(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (k, v) in &self.0 {
            flatten_into(k, v, &mut out);
        }
        out.sort();
        out
    }

    /// Expand dotted keys into a nested values document.
    ///
    /// A scalar at `a` is replaced by a mapping when a deeper key `a.b` is
    /// also present.
    pub fn to_values_document(&self) -> Value {
        let mut root = Map::new();
        for (k, v) in &self.0 {
            let segments: Vec<&str> = k.split('.').filter(|s| !s.is_empty()).collect();
            insert_path(&mut root, &segments, v.clone());
        }
        Value::Object(root)
    }
}

/// Flatten a nested values document back into sorted `key=value` pairs.
pub fn flatten_document(doc: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Value::Object(map) = doc {
        for (k, v) in map {
            flatten_into(k, v, &mut out);
        }
    }
    out.sort();
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                flatten_into(&format!("{prefix}.{k}"), v, out);
            }
        }
        other => out.push(format!("{prefix}={}", scalar_text(other))),
    }
}

fn insert_path(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            if let Value::Object(incoming) = value {
                if let Some(Value::Object(existing)) = node.get_mut(*last) {
                    for (k, v) in incoming {
                        insert_path(existing, &[k.as_str()], v);
                    }
                    return;
                }
                node.insert((*last).to_string(), Value::Object(incoming));
            } else {
                node.insert((*last).to_string(), value);
            }
        }
        [head, rest @ ..] => {
            let child = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

/// Text form of a leaf value as the validator's `--set` parser expects it.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(scalar_text).collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        other => other.to_string(),
    }
}

/// Stringified value used for identity. Objects use their JSON text, which is
/// key-sorted because `serde_json::Map` is a `BTreeMap`.
fn canonical_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl PartialEq for ParameterSet {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_pairs() == other.canonical_pairs()
    }
}

impl Eq for ParameterSet {}

impl Hash for ParameterSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_pairs().hash(state);
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{{}}}", self.to_set_args().join(", "))
    }
}

impl FromIterator<(String, Value)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
