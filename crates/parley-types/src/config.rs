//! Configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `parley.toml`: the model catalog,
//! the agent roster, the conversation flows, and memory/ledger settings.
//! Every field has a serde default so a partial file is always valid.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agent::Agent;

/// Top-level configuration, loaded once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// Model catalog; agents bind to entries by `model` name.
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Agent definitions available to flows.
    #[serde(default)]
    pub agents: Vec<Agent>,

    /// Named conversation flows.
    #[serde(default)]
    pub flows: Vec<FlowConfig>,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Reported to callers as the token ceiling of a response.
    #[serde(default = "default_max_token_count")]
    pub max_token_count: u32,

    /// Model round-trips allowed inside a single turn while tools are requested.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
}

fn default_max_token_count() -> u32 {
    4096
}

fn default_max_tool_iterations() -> u32 {
    5
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            agents: Vec::new(),
            flows: Vec::new(),
            memory: MemoryConfig::default(),
            ledger: LedgerConfig::default(),
            max_token_count: default_max_token_count(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

/// A model catalog entry.
///
/// `api_key` is never serialized and is redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Catalog key, also sent as the model identifier unless a deployment is set.
    pub model: String,

    /// `openai` or `azure`.
    #[serde(default = "default_api_type")]
    pub api_type: String,

    #[serde(default)]
    pub api_version: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Azure deployment name; defaults to `model`.
    #[serde(default)]
    pub deployment: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable to read the API key from when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_type() -> String {
    "openai".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// A catalog entry with defaults for everything but the name.
    pub fn named(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_type: default_api_type(),
            api_version: None,
            base_url: None,
            deployment: None,
            api_key: None,
            api_key_env: None,
            temperature: None,
            max_tokens: default_max_tokens(),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("api_type", &self.api_type)
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("deployment", &self.deployment)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("api_key_env", &self.api_key_env)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// How the next speaker is picked among the allowed candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Ask the manager model which allowed candidate speaks next.
    #[default]
    Auto,
    /// Rotate through the allowed candidates in roster order.
    RoundRobin,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::Auto => write!(f, "auto"),
            SelectionMethod::RoundRobin => write!(f, "round_robin"),
        }
    }
}

/// Built-in conversation patterns that supply their own roster and graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPattern {
    /// user_proxy -> planner -> researcher -> {topic agents, planner}.
    Classification,
    /// user_proxy -> planner -> researcher -> {sql_writer, analyst}.
    SqlManipulation,
}

/// A named conversation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub name: String,

    #[serde(default)]
    pub pattern: Option<FlowPattern>,

    /// Topic agents for the classification pattern.
    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default = "default_entry_agent")]
    pub entry_agent: String,

    /// Agents taking part, in roster order (pattern agents are added implicitly).
    #[serde(default)]
    pub agents: Vec<String>,

    /// Allowed speaker transitions: speaker -> who may speak next.
    #[serde(default)]
    pub transitions: BTreeMap<String, Vec<String>>,

    /// Round budget; defaults to the pattern's budget, or 10.
    #[serde(default)]
    pub max_round: Option<u32>,

    #[serde(default)]
    pub selection_method: SelectionMethod,

    #[serde(default = "default_max_selection_retries")]
    pub max_selection_retries: u32,

    /// Model consulted for `auto` selection and bound to pattern agents.
    #[serde(default)]
    pub manager_model: Option<String>,
}

fn default_entry_agent() -> String {
    "user_proxy".to_string()
}

fn default_max_selection_retries() -> u32 {
    1
}

impl FlowConfig {
    /// An empty flow with defaults, to be filled by a pattern or by hand.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: None,
            topics: Vec::new(),
            entry_agent: default_entry_agent(),
            agents: Vec::new(),
            transitions: BTreeMap::new(),
            max_round: None,
            selection_method: SelectionMethod::default(),
            max_selection_retries: default_max_selection_retries(),
            manager_model: None,
        }
    }
}

/// Thread memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Fold the stored context into the seed message and keep it updated.
    #[serde(default = "default_true")]
    pub record: bool,

    /// Directory (relative to the data dir) holding `{thread}/context.md`.
    #[serde(default = "default_memory_directory")]
    pub directory: String,
}

fn default_true() -> bool {
    true
}

fn default_memory_directory() -> String {
    "memory".to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            record: true,
            directory: default_memory_directory(),
        }
    }
}

/// Audit artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub persist_artifacts: bool,

    #[serde(default = "default_revision_id")]
    pub revision_id: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_revision_id() -> String {
    "latest".to_string()
}

fn default_output_dir() -> String {
    "functional_test_outputs".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            persist_artifacts: false,
            revision_id: default_revision_id(),
            output_dir: default_output_dir(),
        }
    }
}
