//! Conversation flows: a roster, a transition graph, and run settings.
//!
//! Flows are built once at startup from configuration and shared
//! read-only across conversations.

use std::collections::BTreeMap;

use parley_types::agent::{Agent, AgentRole};
use parley_types::config::{FlowConfig, ModelConfig, ParleyConfig, SelectionMethod};
use parley_types::error::ConfigError;
use tracing::debug;

use super::graph::ConversationGraph;
use super::patterns::{self, DEFAULT_MAX_ROUND};
use crate::agent::registry::AgentRegistry;

#[derive(Debug, Clone)]
pub struct ConversationFlow {
    name: String,
    entry_agent: String,
    registry: AgentRegistry,
    graph: ConversationGraph,
    max_round: u32,
    selection_method: SelectionMethod,
    max_selection_retries: u32,
    manager: Option<ModelConfig>,
}

impl ConversationFlow {
    /// Assemble a flow from an already bound registry and explicit transitions.
    ///
    /// Uses `auto` selection with one retry and no manager model until
    /// configured otherwise.
    pub fn new(
        name: impl Into<String>,
        entry_agent: impl Into<String>,
        registry: AgentRegistry,
        transitions: &BTreeMap<String, Vec<String>>,
        max_round: u32,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let entry_agent = entry_agent.into();
        if !registry.contains(&entry_agent) {
            return Err(ConfigError::UnknownAgent(entry_agent));
        }
        if max_round == 0 {
            return Err(ConfigError::Invalid(format!(
                "flow '{name}' must allow at least one round"
            )));
        }
        let graph = ConversationGraph::new(&registry, transitions)?;
        Ok(Self {
            name,
            entry_agent,
            registry,
            graph,
            max_round,
            selection_method: SelectionMethod::Auto,
            max_selection_retries: 1,
            manager: None,
        })
    }

    pub fn with_selection(mut self, method: SelectionMethod, max_retries: u32) -> Self {
        self.selection_method = method;
        self.max_selection_retries = max_retries;
        self
    }

    pub fn with_manager(mut self, manager: ModelConfig) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Build a flow from configuration.
    ///
    /// The roster is the pattern's roster (if any) followed by `config.agents`.
    /// Each name resolves to a configured agent first and a built-in pattern
    /// agent second. Configured transitions replace pattern transitions per
    /// source agent. Every agent is bound to the model catalog.
    pub fn from_config(
        config: &FlowConfig,
        agents: &[Agent],
        catalog: &[ModelConfig],
    ) -> Result<Self, ConfigError> {
        let manager_name = config
            .manager_model
            .clone()
            .or_else(|| catalog.first().map(|m| m.model.clone()))
            .unwrap_or_default();

        let pattern = config.pattern.or_else(|| patterns::pattern_for_flow(&config.name));
        let layout = pattern.map(|p| patterns::layout(p, &config.topics, &manager_name));

        let mut roster: Vec<String> = Vec::new();
        let mut transitions = BTreeMap::new();
        let mut builtins: Vec<Agent> = Vec::new();
        let mut default_round = DEFAULT_MAX_ROUND;
        if let Some(layout) = layout {
            roster.extend(layout.roster);
            transitions.extend(layout.transitions);
            builtins = layout.builtin_agents;
            default_round = layout.max_round;
        }
        for name in &config.agents {
            if !roster.contains(name) {
                roster.push(name.clone());
            }
        }
        if !roster.contains(&config.entry_agent) {
            roster.insert(0, config.entry_agent.clone());
        }
        transitions.extend(config.transitions.clone());

        let mut registry = AgentRegistry::new();
        for name in &roster {
            let agent = agents
                .iter()
                .find(|a| &a.name == name)
                .or_else(|| builtins.iter().find(|a| &a.name == name))
                .cloned()
                .ok_or_else(|| ConfigError::UnknownAgent(name.clone()))?;
            registry.register(agent)?;
        }
        registry.bind_models(catalog)?;

        let manager = match &config.manager_model {
            Some(model) => Some(
                catalog
                    .iter()
                    .find(|m| &m.model == model)
                    .cloned()
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "flow '{}' uses unknown manager model '{model}'",
                            config.name
                        ))
                    })?,
            ),
            None => registry
                .agents()
                .iter()
                .find(|a| a.role != AgentRole::UserProxy)
                .and_then(|a| a.model.clone()),
        };

        let flow = Self::new(
            config.name.clone(),
            config.entry_agent.clone(),
            registry,
            &transitions,
            config.max_round.unwrap_or(default_round),
        )?
        .with_selection(config.selection_method, config.max_selection_retries);

        debug!(
            flow = %flow.name,
            agents = flow.registry.len(),
            max_round = flow.max_round,
            selection = %flow.selection_method,
            "conversation flow built"
        );

        Ok(match manager {
            Some(manager) => flow.with_manager(manager),
            None => flow,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry_agent(&self) -> &str {
        &self.entry_agent
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &ConversationGraph {
        &self.graph
    }

    pub fn max_round(&self) -> u32 {
        self.max_round
    }

    pub fn selection_method(&self) -> SelectionMethod {
        self.selection_method
    }

    pub fn max_selection_retries(&self) -> u32 {
        self.max_selection_retries
    }

    pub fn manager(&self) -> Option<&ModelConfig> {
        self.manager.as_ref()
    }
}

/// Build every configured flow, keyed by name.
pub fn build_flows(config: &ParleyConfig) -> Result<BTreeMap<String, ConversationFlow>, ConfigError> {
    let mut flows = BTreeMap::new();
    for flow_config in &config.flows {
        let flow = ConversationFlow::from_config(flow_config, &config.agents, &config.models)?;
        if flows.insert(flow.name().to_string(), flow).is_some() {
            return Err(ConfigError::Invalid(format!(
                "conversation flow '{}' is defined more than once",
                flow_config.name
            )));
        }
    }
    Ok(flows)
}
