//! Agent definition types for Parley.
//!
//! An `Agent` is a named role with a system prompt and a declared model. It
//! is deserialized from configuration, bound to a `ModelConfig` once at
//! startup, and read-only afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;

/// The closed set of roles an agent can play in a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Delivers the user's question; never consults a model.
    UserProxy,
    /// Routes work and decides when the conversation is finished.
    Planner,
    /// Delegates to specialists and composes the final answer.
    Researcher,
    /// Domain agent (topic expert, SQL writer, analyst, ...).
    #[default]
    Specialist,
}

impl AgentRole {
    /// Whether agents with this role produce turns through a model.
    pub fn consults_model(self) -> bool {
        !matches!(self, AgentRole::UserProxy)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::UserProxy => write!(f, "user_proxy"),
            AgentRole::Planner => write!(f, "planner"),
            AgentRole::Researcher => write!(f, "researcher"),
            AgentRole::Specialist => write!(f, "specialist"),
        }
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user_proxy" => Ok(AgentRole::UserProxy),
            "planner" => Ok(AgentRole::Planner),
            "researcher" => Ok(AgentRole::Researcher),
            "specialist" => Ok(AgentRole::Specialist),
            other => Err(format!("invalid agent role: '{other}'")),
        }
    }
}

/// A conversational agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique name; also the speaker name in transcripts.
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub role: AgentRole,

    /// Name of the model catalog entry this agent binds to.
    #[serde(rename = "model", default)]
    pub model_name: String,

    /// Catalog entry attached by `AgentRegistry::bind_models`.
    #[serde(skip)]
    pub model: Option<ModelConfig>,

    #[serde(default)]
    pub system_prompt: String,

    /// Deliver this agent's turns to the audit feed and persist artifacts.
    #[serde(default = "default_true")]
    pub log_to_audit: bool,

    /// Include this agent's turns in the response returned to the caller.
    #[serde(default)]
    pub include_in_response: bool,

    /// Tool names this agent may call.
    #[serde(default)]
    pub tools: Vec<String>,

    /// Reply used by agents that do not consult a model.
    #[serde(default)]
    pub auto_reply: String,
}

fn default_true() -> bool {
    true
}

impl Agent {
    /// Create an agent with defaults for the optional fields.
    pub fn new(
        name: impl Into<String>,
        role: AgentRole,
        model_name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: String::new(),
            role,
            model_name: model_name.into(),
            model: None,
            system_prompt: system_prompt.into(),
            log_to_audit: true,
            include_in_response: false,
            tools: Vec::new(),
            auto_reply: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Name shown to humans; falls back to `name`.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the agent's turns go to the live feed at all.
    pub fn is_delivered(&self) -> bool {
        self.log_to_audit || self.include_in_response
    }
}
