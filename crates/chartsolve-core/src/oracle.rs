//! The oracle seam: the only way the search learns anything about a target.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{ParameterSet, ValidationResult};

/// Answers "does this target validate with these overrides?".
///
/// Implementations never fail: launch problems, timeouts and rejections are
/// all reported as [`ValidationResult`] values.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn invoke(&self, target_path: &Path, params: &ParameterSet) -> ValidationResult;
}

