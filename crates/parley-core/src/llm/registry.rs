//! Provider registry keyed by model catalog name.

use std::collections::HashMap;

use parley_types::error::ConfigError;

use super::box_provider::BoxLlmProvider;

/// Registry of completion providers, indexed by the model name agents bind to.
///
/// Built once at startup and shared read-only behind an `Arc`.
pub struct ProviderRegistry {
    providers: HashMap<String, BoxLlmProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider for the given model name.
    ///
    /// If a provider for this model already exists, it is replaced.
    pub fn register(&mut self, model: impl Into<String>, provider: BoxLlmProvider) {
        self.providers.insert(model.into(), provider);
    }

    pub fn get(&self, model: &str) -> Option<&BoxLlmProvider> {
        self.providers.get(model)
    }

    /// Look up the provider for `model`, failing with a configuration error.
    pub fn resolve(&self, model: &str) -> Result<&BoxLlmProvider, ConfigError> {
        self.get(model)
            .ok_or_else(|| ConfigError::MissingProvider(model.to_string()))
    }

    /// Registered model names, sorted.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
