//! LLM provider implementations.
//!
//! Contains the OpenAI-compatible implementation of the [`LlmProvider`]
//! trait defined in `parley-core`, plus the factory that turns the model
//! catalog into a [`ProviderRegistry`].
//!
//! [`LlmProvider`]: parley_core::llm::provider::LlmProvider

pub mod openai_compat;

use secrecy::SecretString;

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::llm::registry::ProviderRegistry;
use parley_types::config::ModelConfig;
use parley_types::error::ConfigError;

use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] for one catalog entry.
///
/// The API key must already be resolved (see `config::resolve_api_keys`).
pub fn create_provider(config: &ModelConfig) -> Result<BoxLlmProvider, ConfigError> {
    let key = config.api_key.as_deref().ok_or_else(|| {
        ConfigError::Invalid(format!(
            "model '{}' has no API key; set api_key or api_key_env",
            config.model
        ))
    })?;
    let provider = OpenAiCompatibleProvider::new(config, SecretString::from(key.to_string()))?;
    Ok(BoxLlmProvider::new(provider))
}

/// One provider per catalog entry, keyed by model name.
pub fn build_provider_registry(models: &[ModelConfig]) -> Result<ProviderRegistry, ConfigError> {
    let mut registry = ProviderRegistry::new();
    for model in models {
        registry.register(model.model.clone(), create_provider(model)?);
        tracing::debug!(model = %model.model, api_type = %model.api_type, "provider registered");
    }
    Ok(registry)
}
