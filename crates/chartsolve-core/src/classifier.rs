//! Diagnostic classifier: validator output -> [`ErrorCategory`].
//!
//! Rules are plain data ([`RuleSet`]) evaluated first-match-wins. Order is the
//! contract: one message often matches several categories (a schema failure
//! also says "error", a missing storage class also says "storage"), so the
//! more specific categories come first.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ErrorCategory;

/// One way a rule can match a diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchPattern {
    /// Case-insensitive substring.
    Substring { text: String },
    /// Case-insensitive regular expression.
    Regex { pattern: String },
}

impl MatchPattern {
    pub fn substring(text: impl Into<String>) -> Self {
        MatchPattern::Substring { text: text.into() }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        MatchPattern::Regex {
            pattern: pattern.into(),
        }
    }
}

/// A category and the patterns that select it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierRule {
    pub category: ErrorCategory,
    pub patterns: Vec<MatchPattern>,
}

impl ClassifierRule {
    /// Rule made only of substrings.
    pub fn substrings(category: ErrorCategory, texts: &[&str]) -> Self {
        Self {
            category,
            patterns: texts.iter().map(|t| MatchPattern::substring(*t)).collect(),
        }
    }

    /// Append a regex pattern (builder pattern).
    pub fn with_regex(mut self, pattern: &str) -> Self {
        self.patterns.push(MatchPattern::regex(pattern));
        self
    }
}

/// An ordered list of rules evaluated first-match-wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<ClassifierRule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule and return `self` (builder pattern).
    pub fn with_rule(mut self, rule: ClassifierRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The built-in rules for Helm validator output.
    ///
    /// Precedence: version > required value > parse > schema > coalesce >
    /// registry > storage > auth > CRD > template > library > deprecated >
    /// timeout > configuration.
    pub fn standard() -> Self {
        use ErrorCategory::*;

        Self::empty()
            .with_rule(
                ClassifierRule::substrings(
                    KubeVersionError,
                    &[
                        "version constraint",
                        "kube version",
                        "kubernetes version",
                        "not compatible with",
                        "incompatible version",
                    ],
                )
                .with_regex(r"(?s)kubeversion\b.*\bincompatible"),
            )
            .with_rule(ClassifierRule::substrings(
                RequiredValueError,
                &[
                    "required value",
                    "required field",
                    "value is required",
                    "cannot be empty",
                    "must be set",
                    "is required",
                    "missing required field",
                ],
            ))
            .with_rule(ClassifierRule::substrings(
                YamlError,
                &[
                    "failed to parse",
                    "yaml:",
                    "json:",
                    "invalid yaml syntax",
                    "unable to parse yaml",
                ],
            ))
            .with_rule(ClassifierRule::substrings(
                SchemaError,
                &[
                    "schema(s)",
                    "don't meet the specifications",
                    "validation failed",
                    "schema validation",
                    "specifications of the schema",
                    "invalid schema",
                ],
            ))
            .with_rule(ClassifierRule::substrings(
                CoalesceError,
                &[
                    "wrong type for value",
                    "coalesce.go",
                    "destination for",
                    "expected type",
                    "cannot merge",
                ],
            ))
            .with_rule(ClassifierRule::substrings(
                RegistryError,
                &[
                    "image registry",
                    "cannot pull image",
                    "registry",
                    "repository",
                    "docker.io",
                    "image pull",
                ],
            ))
            .with_rule(ClassifierRule::substrings(
                StorageError,
                &["persistence", "storage", "volume", "pvc", "storageclass"],
            ))
            .with_rule(ClassifierRule::substrings(
                AuthError,
                &["auth", "credentials", "password", "secret", "access denied"],
            ))
            .with_rule(ClassifierRule::substrings(
                CrdError,
                &[
                    "crd",
                    "custom resource",
                    "installcrds",
                    "apiversion",
                    "resource definition",
                ],
            ))
            .with_rule(ClassifierRule::substrings(
                TemplateError,
                &["template", "rendering", "render", "execution error"],
            ))
            .with_rule(ClassifierRule::substrings(
                LibraryError,
                &["library charts are not installable"],
            ))
            .with_rule(ClassifierRule::substrings(
                DeprecatedError,
                &["chart is deprecated"],
            ))
            .with_rule(ClassifierRule::substrings(
                TimeoutError,
                &["timeout", "timed out", "deadline exceeded"],
            ))
            .with_rule(ClassifierRule::substrings(
                ConfigError,
                &["configuration", "config", "not valid"],
            ))
    }
}

enum CompiledPattern {
    Substring(String),
    Regex(Regex),
}

impl CompiledPattern {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            CompiledPattern::Substring(text) => lowered.contains(text.as_str()),
            CompiledPattern::Regex(re) => re.is_match(lowered),
        }
    }
}

/// A compiled [`RuleSet`].
pub struct ErrorClassifier {
    rules: Vec<(ErrorCategory, Vec<CompiledPattern>)>,
}

impl ErrorClassifier {
    /// Compile a rule set. Fails only on an invalid regex.
    pub fn new(rule_set: &RuleSet) -> Result<Self, regex::Error> {
        let mut rules = Vec::with_capacity(rule_set.rules.len());
        for rule in &rule_set.rules {
            let mut compiled = Vec::with_capacity(rule.patterns.len());
            for pattern in &rule.patterns {
                compiled.push(match pattern {
                    MatchPattern::Substring { text } => {
                        CompiledPattern::Substring(text.to_lowercase())
                    }
                    MatchPattern::Regex { pattern } => {
                        CompiledPattern::Regex(Regex::new(&format!("(?i){pattern}"))?)
                    }
                });
            }
            rules.push((rule.category, compiled));
        }
        Ok(Self { rules })
    }

    /// The shared classifier built from [`RuleSet::standard`].
    pub fn standard() -> &'static ErrorClassifier {
        static STANDARD: OnceLock<ErrorClassifier> = OnceLock::new();
        STANDARD.get_or_init(|| {
            ErrorClassifier::new(&RuleSet::standard())
                .expect("built-in classifier patterns are valid regexes")
        })
    }

    /// Classify diagnostic text. Empty input and unmatched input are
    /// [`ErrorCategory::UnknownError`].
    pub fn classify(&self, details: &str) -> ErrorCategory {
        if details.trim().is_empty() {
            return ErrorCategory::UnknownError;
        }
        let lowered = details.to_lowercase();
        for (category, patterns) in &self.rules {
            if patterns.iter().any(|p| p.matches(&lowered)) {
                return *category;
            }
        }
        ErrorCategory::UnknownError
    }
}

/// Classify with the built-in rules.
pub fn classify(details: &str) -> ErrorCategory {
    ErrorClassifier::standard().classify(details)
}
