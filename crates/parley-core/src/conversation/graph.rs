//! Allowed speaker transitions.
//!
//! A `ConversationGraph` maps each agent to the ordered list of agents that
//! may speak right after it. The graph is directed and may contain cycles;
//! every name it mentions must be registered in the flow's `AgentRegistry`.

use std::collections::{BTreeMap, HashMap};

use parley_types::error::ConfigError;

use crate::agent::registry::AgentRegistry;

#[derive(Debug, Clone, Default)]
pub struct ConversationGraph {
    edges: HashMap<String, Vec<String>>,
}

impl ConversationGraph {
    /// Build a graph from an explicit adjacency, validated against `registry`.
    ///
    /// Duplicate successors are collapsed, keeping the first occurrence.
    pub fn new(
        registry: &AgentRegistry,
        transitions: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let mut edges = HashMap::with_capacity(transitions.len());
        for (from, successors) in transitions {
            if !registry.contains(from) {
                let to = successors.first().cloned().unwrap_or_default();
                return Err(ConfigError::InvalidGraph {
                    from: from.clone(),
                    to,
                });
            }
            let mut next: Vec<String> = Vec::with_capacity(successors.len());
            for to in successors {
                if !registry.contains(to) {
                    return Err(ConfigError::InvalidGraph {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
                if !next.contains(to) {
                    next.push(to.clone());
                }
            }
            edges.insert(from.clone(), next);
        }
        Ok(Self { edges })
    }

    /// Agents allowed to speak after `speaker`. Empty for leaves and unknown names.
    pub fn allowed_next(&self, speaker: &str) -> &[String] {
        self.edges.get(speaker).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, from: &str, to: &str) -> bool {
        self.allowed_next(from).iter().any(|n| n == to)
    }

    /// Edges sorted by source name, for display.
    pub fn edges(&self) -> BTreeMap<&str, &[String]> {
        self.edges
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_slice()))
            .collect()
    }
}
