//! Strategy configuration - combos and strategy groups
//!
//! A combo names an ordered list of strategy groups; each strategy group is a
//! closed, typed configuration bundle. Both are immutable once loaded and are
//! shared read-only across concurrent tasks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating strategy configuration
///
/// All of these abort a run before any task is scheduled; they are never
/// retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// Strategy group name is empty
    #[error("strategy group has an empty name")]
    EmptyName,

    /// `max_files_per_request` must be at least 1
    #[error("strategy group '{0}': max_files_per_request must be >= 1")]
    ZeroGroupSize(String),

    /// Extraction method selector is empty
    #[error("strategy group '{0}': extraction method is empty")]
    EmptyMethod(String),

    /// Backend selector is empty
    #[error("strategy group '{0}': backend is empty")]
    EmptyBackend(String),

    /// Combo references a strategy group that is not defined
    #[error("combo '{combo}' references unknown strategy group '{group}'")]
    UnknownGroup {
        /// Combo name
        combo: String,
        /// Missing strategy group name
        group: String,
    },

    /// Combo contains no strategy groups
    #[error("combo '{0}' has no strategy groups")]
    EmptyCombo(String),
}

/// A configuration bundle for one extraction strategy
///
/// Selects a text-extraction method, an LLM backend, and per-request limits.
/// Every field is named and typed; unknown keys are rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyGroup {
    /// Unique strategy group name (identity)
    pub name: String,

    /// Text-extraction method selector (e.g. "pdftext", "ocr")
    pub extraction_method: String,

    /// LLM backend selector (e.g. "ollama", "mock")
    pub backend: String,

    /// Maximum number of files sent in one collaborator request
    pub max_files_per_request: usize,

    /// When set, local text extraction is bypassed and raw files are
    /// forwarded to the backend one at a time
    #[serde(default)]
    pub streaming: bool,

    /// Name of the extraction profile supplying the mandatory fields
    #[serde(default = "default_profile_name")]
    pub profile: String,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl StrategyGroup {
    /// Validate the bundle, rejecting degenerate configurations
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.name.trim().is_empty() {
            return Err(StrategyError::EmptyName);
        }
        if self.max_files_per_request == 0 {
            return Err(StrategyError::ZeroGroupSize(self.name.clone()));
        }
        if self.extraction_method.trim().is_empty() {
            return Err(StrategyError::EmptyMethod(self.name.clone()));
        }
        if self.backend.trim().is_empty() {
            return Err(StrategyError::EmptyBackend(self.name.clone()));
        }
        Ok(())
    }
}

/// A named, ordered sequence of strategy group names
///
/// Immutable once loaded; identity is the name. Resolution of group names to
/// [`StrategyGroup`] bundles happens at load time, before any dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    /// Combo name (identity)
    pub name: String,

    /// Ordered strategy group names
    pub groups: Vec<String>,
}

impl Combo {
    /// Create a combo from a name and group list
    pub fn new(name: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }

    /// Validate the combo against a set of defined strategy groups
    ///
    /// Returns the resolved groups in combo order.
    pub fn resolve<'a>(
        &self,
        defined: &'a [StrategyGroup],
    ) -> Result<Vec<&'a StrategyGroup>, StrategyError> {
        if self.groups.is_empty() {
            return Err(StrategyError::EmptyCombo(self.name.clone()));
        }
        self.groups
            .iter()
            .map(|name| {
                defined
                    .iter()
                    .find(|g| &g.name == name)
                    .ok_or_else(|| StrategyError::UnknownGroup {
                        combo: self.name.clone(),
                        group: name.clone(),
                    })
            })
            .collect()
    }
}
