//! TOML profile store
//!
//! Strategy groups, combos, extraction profiles and collaborator endpoints
//! all live in one TOML file, loaded and validated before any dispatch:
//!
//! ```toml
//! [strategy.text_small]
//! extraction_method = "ocr"
//! backend = "llama"
//! max_files_per_request = 4
//!
//! [combo.fast]
//! groups = ["text_small"]
//!
//! [profile.default]
//! mandatory_fields = ["INVOICE_NO", "ISSUE_DATE", "SELLER_NAME", "TOTAL_GROSS"]
//!
//! [backend.llama]
//! endpoint = "http://localhost:11434"
//! model = "llama3.2"
//!
//! [extractor]
//! endpoint = "http://localhost:8070"
//! ```

use crate::error::{CliError, Result};
use gleaner_domain::{Combo, ExtractionProfile, StrategyGroup};
use gleaner_runner::RunnerConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One `[strategy.<name>]` table; the name comes from the key
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyEntry {
    /// Extraction method selector
    pub extraction_method: String,

    /// Backend selector
    pub backend: String,

    /// FileGroup size cap
    pub max_files_per_request: usize,

    /// Bypass text extraction and send raw file references
    #[serde(default)]
    pub streaming: bool,

    /// Extraction profile name
    #[serde(default = "default_profile_name")]
    pub profile: String,
}

/// One `[combo.<name>]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComboEntry {
    /// Ordered strategy group names
    pub groups: Vec<String>,
}

/// One `[profile.<name>]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileEntry {
    /// Fields a valid result must carry non-empty values for
    pub mandatory_fields: Vec<String>,
}

/// One `[backend.<name>]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendEntry {
    /// Base URL of the generate endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,
}

/// The `[extractor]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractorEntry {
    /// Base URL of the text-extraction service
    pub endpoint: String,
}

/// Optional `[runner]` overrides, applied over built-in defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerOverrides {
    /// See [`RunnerConfig::max_concurrent_strategies`]
    pub max_concurrent_strategies: Option<usize>,

    /// See [`RunnerConfig::max_concurrent_file_groups`]
    pub max_concurrent_file_groups: Option<usize>,

    /// See [`RunnerConfig::max_attempts`]
    pub max_attempts: Option<u32>,

    /// See [`RunnerConfig::call_timeout_secs`]
    pub call_timeout_secs: Option<u64>,

    /// See [`RunnerConfig::run_timeout_secs`]
    pub run_timeout_secs: Option<u64>,
}

/// Parsed and validated profile store
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileStore {
    /// Strategy group definitions
    #[serde(default)]
    pub strategy: BTreeMap<String, StrategyEntry>,

    /// Combo definitions
    #[serde(default)]
    pub combo: BTreeMap<String, ComboEntry>,

    /// Extraction profile definitions
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileEntry>,

    /// LLM backend endpoints
    #[serde(default)]
    pub backend: BTreeMap<String, BackendEntry>,

    /// Text-extraction service endpoint
    #[serde(default)]
    pub extractor: Option<ExtractorEntry>,

    /// Runner overrides
    #[serde(default)]
    pub runner: RunnerOverrides,
}

fn default_profile_name() -> String {
    "default".to_string()
}

impl ProfileStore {
    /// Load and validate a profile store from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        let store: ProfileStore = toml::from_str(&contents)?;
        store.validate()?;
        Ok(store)
    }

    /// Cross-reference every definition
    ///
    /// Strategies must point at defined profiles and backends, combos at
    /// defined strategies, and non-mock extraction methods need the
    /// extractor endpoint. The built-in invoice profile covers a missing
    /// `[profile.default]`.
    pub fn validate(&self) -> Result<()> {
        for (name, entry) in &self.strategy {
            if entry.max_files_per_request == 0 {
                return Err(CliError::Config(format!(
                    "strategy '{name}': max_files_per_request must be positive"
                )));
            }
            if entry.profile != "default" && !self.profile.contains_key(&entry.profile) {
                return Err(CliError::Config(format!(
                    "strategy '{name}' references undefined profile '{}'",
                    entry.profile
                )));
            }
            if entry.backend != "mock" && !self.backend.contains_key(&entry.backend) {
                return Err(CliError::Config(format!(
                    "strategy '{name}' references undefined backend '{}'",
                    entry.backend
                )));
            }
            if entry.extraction_method != "mock" && !entry.streaming && self.extractor.is_none() {
                return Err(CliError::Config(format!(
                    "strategy '{name}' needs an [extractor] endpoint for method '{}'",
                    entry.extraction_method
                )));
            }
        }

        for (name, entry) in &self.combo {
            if entry.groups.is_empty() {
                return Err(CliError::Config(format!("combo '{name}' has no groups")));
            }
            for group in &entry.groups {
                if !self.strategy.contains_key(group) {
                    return Err(CliError::Config(format!(
                        "combo '{name}' references undefined strategy '{group}'"
                    )));
                }
            }
        }

        for (name, entry) in &self.profile {
            if entry.mandatory_fields.is_empty() {
                return Err(CliError::Config(format!(
                    "profile '{name}' has no mandatory fields"
                )));
            }
        }
        Ok(())
    }

    /// All strategy groups as domain values
    pub fn strategy_groups(&self) -> Vec<StrategyGroup> {
        self.strategy
            .iter()
            .map(|(name, entry)| StrategyGroup {
                name: name.clone(),
                extraction_method: entry.extraction_method.clone(),
                backend: entry.backend.clone(),
                max_files_per_request: entry.max_files_per_request,
                streaming: entry.streaming,
                profile: entry.profile.clone(),
            })
            .collect()
    }

    /// All combos as domain values
    pub fn combos(&self) -> Vec<Combo> {
        self.combo
            .iter()
            .map(|(name, entry)| Combo::new(name.clone(), entry.groups.clone()))
            .collect()
    }

    /// Look up one combo by name
    pub fn combo(&self, name: &str) -> Result<Combo> {
        self.combo
            .get(name)
            .map(|entry| Combo::new(name, entry.groups.clone()))
            .ok_or_else(|| CliError::Config(format!("combo '{name}' is not defined")))
    }

    /// All extraction profiles, with the built-in invoice profile standing
    /// in when no `[profile.default]` is declared
    pub fn profiles(&self) -> Vec<ExtractionProfile> {
        let mut profiles: Vec<ExtractionProfile> = self
            .profile
            .iter()
            .map(|(name, entry)| {
                ExtractionProfile::new(name.clone(), entry.mandatory_fields.clone())
            })
            .collect();
        if !self.profile.contains_key("default") {
            profiles.push(ExtractionProfile::invoice_default());
        }
        profiles
    }

    /// Runner config from built-in defaults, file overrides, then CLI flags
    pub fn runner_config(
        &self,
        checkpoint: Option<PathBuf>,
        benchmark: Option<PathBuf>,
    ) -> RunnerConfig {
        let defaults = RunnerConfig::default();
        RunnerConfig {
            max_concurrent_strategies: self
                .runner
                .max_concurrent_strategies
                .unwrap_or(defaults.max_concurrent_strategies),
            max_concurrent_file_groups: self
                .runner
                .max_concurrent_file_groups
                .unwrap_or(defaults.max_concurrent_file_groups),
            max_attempts: self.runner.max_attempts.unwrap_or(defaults.max_attempts),
            call_timeout_secs: self
                .runner
                .call_timeout_secs
                .unwrap_or(defaults.call_timeout_secs),
            run_timeout_secs: self.runner.run_timeout_secs.or(defaults.run_timeout_secs),
            checkpoint_path: checkpoint,
            benchmark_path: benchmark,
        }
    }
}
