//! Fixed error taxonomy assigned by the classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a validator rejection or a target-level failure.
///
/// The serialized names are the stable identifiers written into checkpoints
/// and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Chart declares a kubeVersion constraint the render target fails.
    KubeVersionError,
    /// A value the chart marks as required is unset.
    RequiredValueError,
    /// YAML/JSON parse or syntax failure.
    YamlError,
    /// `values.schema.json` validation failure.
    SchemaError,
    /// Type mismatch while coalescing values.
    CoalesceError,
    /// Image registry or repository problem.
    RegistryError,
    /// Persistence / storage class problem.
    StorageError,
    /// Credentials or secrets problem.
    AuthError,
    /// Custom resource definition problem.
    CrdError,
    /// Template rendering failure.
    TemplateError,
    /// Library charts cannot be rendered on their own.
    LibraryError,
    /// Chart is deprecated.
    DeprecatedError,
    /// Validator exceeded the wall-clock bound.
    TimeoutError,
    /// Generic configuration problem.
    ConfigError,
    /// Target could not be located.
    SetupError,
    /// Packaged target could not be unpacked.
    ExtractionError,
    /// Anything else, including worker crashes.
    UnknownError,
}

impl ErrorCategory {
    /// Every category, in classifier precedence order followed by the
    /// target-level categories.
    pub const ALL: [ErrorCategory; 17] = [
        ErrorCategory::KubeVersionError,
        ErrorCategory::RequiredValueError,
        ErrorCategory::YamlError,
        ErrorCategory::SchemaError,
        ErrorCategory::CoalesceError,
        ErrorCategory::RegistryError,
        ErrorCategory::StorageError,
        ErrorCategory::AuthError,
        ErrorCategory::CrdError,
        ErrorCategory::TemplateError,
        ErrorCategory::LibraryError,
        ErrorCategory::DeprecatedError,
        ErrorCategory::TimeoutError,
        ErrorCategory::ConfigError,
        ErrorCategory::SetupError,
        ErrorCategory::ExtractionError,
        ErrorCategory::UnknownError,
    ];

    /// Stable identifier (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::KubeVersionError => "KUBE_VERSION_ERROR",
            ErrorCategory::RequiredValueError => "REQUIRED_VALUE_ERROR",
            ErrorCategory::YamlError => "YAML_ERROR",
            ErrorCategory::SchemaError => "SCHEMA_ERROR",
            ErrorCategory::CoalesceError => "COALESCE_ERROR",
            ErrorCategory::RegistryError => "REGISTRY_ERROR",
            ErrorCategory::StorageError => "STORAGE_ERROR",
            ErrorCategory::AuthError => "AUTH_ERROR",
            ErrorCategory::CrdError => "CRD_ERROR",
            ErrorCategory::TemplateError => "TEMPLATE_ERROR",
            ErrorCategory::LibraryError => "LIBRARY_ERROR",
            ErrorCategory::DeprecatedError => "DEPRECATED_ERROR",
            ErrorCategory::TimeoutError => "TIMEOUT_ERROR",
            ErrorCategory::ConfigError => "CONFIG_ERROR",
            ErrorCategory::SetupError => "SETUP_ERROR",
            ErrorCategory::ExtractionError => "EXTRACTION_ERROR",
            ErrorCategory::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::KubeVersionError => "Kubernetes version incompatibility",
            ErrorCategory::RequiredValueError => "Required chart value is missing",
            ErrorCategory::YamlError => "YAML parsing or syntax error",
            ErrorCategory::SchemaError => "Chart schema validation error",
            ErrorCategory::CoalesceError => "Type mismatch in value coalescing",
            ErrorCategory::RegistryError => "Registry configuration issue",
            ErrorCategory::StorageError => "Persistence or storage configuration issue",
            ErrorCategory::AuthError => "Authentication or credentials issue",
            ErrorCategory::CrdError => "Custom Resource Definition issue",
            ErrorCategory::TemplateError => "Helm template rendering failed",
            ErrorCategory::LibraryError => "Library chart installation attempted",
            ErrorCategory::DeprecatedError => "Chart is deprecated",
            ErrorCategory::TimeoutError => "Processing timed out",
            ErrorCategory::ConfigError => "Chart configuration error",
            ErrorCategory::SetupError => "Chart path or prerequisite error",
            ErrorCategory::ExtractionError => "Chart archive could not be unpacked",
            ErrorCategory::UnknownError => "Unclassified error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
