//! Configuration loader for Parley.
//!
//! Reads a TOML file (default `{data_dir}/parley.toml`) into
//! [`ParleyConfig`]. A missing file yields the defaults; a file that does not
//! parse is a configuration error.

use std::path::{Path, PathBuf};

use parley_types::config::ParleyConfig;
use parley_types::error::ConfigError;

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "parley.toml";

/// Default config location: `{data_dir}/parley.toml`.
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load configuration from `path` and resolve API keys from the environment.
///
/// - Missing file: logs a warning and returns [`ParleyConfig::default()`].
/// - Unreadable or malformed file: [`ConfigError::Invalid`].
pub async fn load_config(path: &Path) -> Result<ParleyConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "no config file found, using defaults");
            return Ok(ParleyConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Invalid(format!(
                "failed to read {}: {err}",
                path.display()
            )));
        }
    };

    let mut config = parse_config(&content)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    resolve_api_keys(&mut config);
    tracing::debug!(
        path = %path.display(),
        models = config.models.len(),
        agents = config.agents.len(),
        flows = config.flows.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Parse TOML text into a config without touching the environment.
pub fn parse_config(content: &str) -> Result<ParleyConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Fill `api_key` from `api_key_env` where no key is set inline.
pub fn resolve_api_keys(config: &mut ParleyConfig) {
    for model in &mut config.models {
        if model.api_key.is_some() {
            continue;
        }
        let Some(var) = &model.api_key_env else {
            continue;
        };
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => model.api_key = Some(key),
            _ => tracing::warn!(model = %model.model, env = %var, "API key variable is not set"),
        }
    }
}
