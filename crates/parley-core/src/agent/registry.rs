//! Agent registry: the roster of a conversation flow.
//!
//! Agents are registered once at startup, bound to their model catalog
//! entries, and then shared read-only for the lifetime of the process.

use std::collections::HashMap;

use parley_types::agent::Agent;
use parley_types::config::ModelConfig;
use parley_types::error::{ConfigError, RegistryError};

/// Name-indexed set of agents, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of agents, rejecting duplicates.
    pub fn from_agents(agents: impl IntoIterator<Item = Agent>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for agent in agents {
            registry.register(agent)?;
        }
        Ok(registry)
    }

    /// Add an agent. Names are unique.
    pub fn register(&mut self, agent: Agent) -> Result<(), ConfigError> {
        if self.index.contains_key(&agent.name) {
            return Err(ConfigError::DuplicateAgent(agent.name));
        }
        self.index.insert(agent.name.clone(), self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Agent, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.agents[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Attach a model configuration to every agent by matching its declared
    /// model name against the catalog.
    ///
    /// Fails on the first agent (in registration order) whose model has no
    /// catalog entry; agents before it keep their binding.
    pub fn bind_models(&mut self, catalog: &[ModelConfig]) -> Result<(), ConfigError> {
        for agent in &mut self.agents {
            let model = catalog
                .iter()
                .find(|m| m.model == agent.model_name)
                .ok_or_else(|| ConfigError::UnknownModel {
                    agent: agent.name.clone(),
                    model: agent.model_name.clone(),
                })?;
            agent.model = Some(model.clone());
        }
        Ok(())
    }

    /// All agents in registration order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Agents whose turns are recorded to the audit trail.
    pub fn agents_for_audit(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(|a| a.log_to_audit)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.name.as_str())
    }

    /// Registration position of `name`, used for stable ordering.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
