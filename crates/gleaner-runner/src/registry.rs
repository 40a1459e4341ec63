//! Collaborator registry
//!
//! Maps the selector strings of strategy groups to registered collaborator
//! instances. Resolution happens once, before any dispatch; an unknown
//! selector is a configuration error, never a per-file failure.

use crate::error::RunnerError;
use gleaner_domain::{ExtractionProfile, LlmBackend, StrategyGroup, TextExtractor};
use std::collections::HashMap;
use std::sync::Arc;

/// A strategy group with its selectors resolved to live collaborators
#[derive(Clone)]
pub struct ResolvedStrategy {
    /// The configuration bundle
    pub group: Arc<StrategyGroup>,

    /// Text-extraction collaborator (ignored when `group.streaming` is set)
    pub extractor: Arc<dyn TextExtractor>,

    /// LLM collaborator
    pub backend: Arc<dyn LlmBackend>,

    /// Mandatory-field profile
    pub profile: Arc<ExtractionProfile>,
}

/// Registry of collaborator implementations and extraction profiles
#[derive(Default)]
pub struct CollaboratorRegistry {
    extractors: HashMap<String, Arc<dyn TextExtractor>>,
    backends: HashMap<String, Arc<dyn LlmBackend>>,
    profiles: HashMap<String, Arc<ExtractionProfile>>,
}

impl CollaboratorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a text extractor under a method name
    pub fn register_extractor(&mut self, name: impl Into<String>, ext: Arc<dyn TextExtractor>) {
        self.extractors.insert(name.into(), ext);
    }

    /// Register an LLM backend under a backend name
    pub fn register_backend(&mut self, name: impl Into<String>, backend: Arc<dyn LlmBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Register an extraction profile
    pub fn register_profile(&mut self, profile: ExtractionProfile) {
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
    }

    /// Resolve a strategy group's selectors
    pub fn resolve(&self, group: &StrategyGroup) -> Result<ResolvedStrategy, RunnerError> {
        group.validate()?;

        let extractor = self
            .extractors
            .get(&group.extraction_method)
            .cloned()
            .ok_or_else(|| RunnerError::UnknownExtractor(group.extraction_method.clone()))?;
        let backend = self
            .backends
            .get(&group.backend)
            .cloned()
            .ok_or_else(|| RunnerError::UnknownBackend(group.backend.clone()))?;
        let profile = self
            .profiles
            .get(&group.profile)
            .cloned()
            .ok_or_else(|| RunnerError::UnknownProfile(group.profile.clone()))?;

        Ok(ResolvedStrategy {
            group: Arc::new(group.clone()),
            extractor,
            backend,
            profile,
        })
    }
}
