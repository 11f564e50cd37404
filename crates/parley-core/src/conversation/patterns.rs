//! Built-in conversation patterns.
//!
//! A pattern contributes the coordinating agents (`user_proxy`, `planner`,
//! `researcher`), the roster order, the transition graph, and a default
//! round budget. Domain agents (topic experts, `sql_writer`, `analyst`)
//! always come from configuration.

use std::collections::BTreeMap;

use parley_types::agent::{Agent, AgentRole};
use parley_types::config::FlowPattern;

pub const CLASSIFICATION_FLOW: &str = "classification_agent";
pub const SQL_MANIPULATION_FLOW: &str = "sql_manipulation_agent";

pub const USER_PROXY: &str = "user_proxy";
pub const PLANNER: &str = "planner";
pub const RESEARCHER: &str = "researcher";
pub const SQL_WRITER: &str = "sql_writer";
pub const ANALYST: &str = "analyst";

/// Round budget used when neither the pattern nor the flow sets one.
pub const DEFAULT_MAX_ROUND: u32 = 10;

/// What a pattern contributes to a flow.
#[derive(Debug, Clone)]
pub struct PatternLayout {
    /// Built-in agents; configured agents with the same name replace them.
    pub builtin_agents: Vec<Agent>,
    /// Roster names in order, built-in and configured.
    pub roster: Vec<String>,
    pub transitions: BTreeMap<String, Vec<String>>,
    pub max_round: u32,
}

/// Layout of `pattern`, with built-in agents bound to `model_name`.
pub fn layout(pattern: FlowPattern, topics: &[String], model_name: &str) -> PatternLayout {
    match pattern {
        FlowPattern::Classification => classification(topics, model_name),
        FlowPattern::SqlManipulation => sql_manipulation(model_name),
    }
}

/// Pattern implied by a well-known flow name.
pub fn pattern_for_flow(name: &str) -> Option<FlowPattern> {
    match name {
        CLASSIFICATION_FLOW => Some(FlowPattern::Classification),
        SQL_MANIPULATION_FLOW => Some(FlowPattern::SqlManipulation),
        _ => None,
    }
}

fn user_proxy(model_name: &str) -> Agent {
    let mut agent = Agent::new(
        USER_PROXY,
        AgentRole::UserProxy,
        model_name,
        "I enhance the user question with context.",
    )
    .with_description("Delivers the user question.");
    agent.log_to_audit = false;
    agent
}

fn classification(topics: &[String], model_name: &str) -> PatternLayout {
    let planner = Agent::new(
        PLANNER,
        AgentRole::Planner,
        model_name,
        "Tasks:\n\
         - Hand the question and its context to `researcher`; do not propose queries.\n\
         - Once `researcher` has composed the final response, reply with TERMINATE.\n\
         - Never answer the user question yourself.",
    )
    .with_description("Responds after `user_proxy` or a topic agent.");

    let researcher = Agent::new(
        RESEARCHER,
        AgentRole::Researcher,
        model_name,
        format!(
            "Tasks:\n\
             - Work out which topic the user question belongs to and hand it to the matching topic agent: {}.\n\
             - Compose the final response for the user.\n\
             Rules:\n\
             - Keep the topic of earlier turns unless the user changes it.\n\
             - If the question fits none of the topics, say so and list the topics.\n\
             - Do not answer or comment on the question yourself.\n\
             - For greetings, briefly describe what you can do.",
            topics.join(", ")
        ),
    )
    .with_description("Responds after `planner` or a topic agent.");

    let mut transitions = BTreeMap::new();
    transitions.insert(USER_PROXY.to_string(), vec![PLANNER.to_string()]);
    transitions.insert(PLANNER.to_string(), vec![RESEARCHER.to_string()]);
    let mut researcher_next: Vec<String> = topics.to_vec();
    researcher_next.push(PLANNER.to_string());
    transitions.insert(RESEARCHER.to_string(), researcher_next);
    for topic in topics {
        transitions.insert(topic.clone(), vec![PLANNER.to_string()]);
    }

    let mut roster = vec![
        USER_PROXY.to_string(),
        RESEARCHER.to_string(),
        PLANNER.to_string(),
    ];
    roster.extend(topics.iter().cloned());

    PatternLayout {
        builtin_agents: vec![user_proxy(model_name), researcher, planner],
        roster,
        transitions,
        max_round: 9,
    }
}

fn sql_manipulation(model_name: &str) -> PatternLayout {
    let planner = Agent::new(
        PLANNER,
        AgentRole::Planner,
        model_name,
        "Tasks:\n\
         - Hand the question and its context to `researcher`; do not propose queries.\n\
         - When asked to compose the final result, ask `researcher` to compose the final response.\n\
         - When the query result needs examining, ask `researcher` for the final response and flag that the data needs extra attention.\n\
         - Reply with TERMINATE once `researcher` has delivered the final answer.\n\
         - Never answer the user question or summarize it yourself.",
    )
    .with_description("Responds after `user_proxy` or `analyst`.");

    let researcher = Agent::new(
        RESEARCHER,
        AgentRole::Researcher,
        model_name,
        "Tasks:\n\
         - Hand the user question to `sql_writer`; do not suggest queries or tables.\n\
         - Once the SQL result arrives, ask `analyst` to summarize it in natural language.\n\
         - Compose the final response for the user.\n\
         - Never write queries; interpret results only.",
    )
    .with_description("Speaks only after `planner`, `analyst` or `sql_writer`.");

    let mut transitions = BTreeMap::new();
    transitions.insert(USER_PROXY.to_string(), vec![PLANNER.to_string()]);
    transitions.insert(PLANNER.to_string(), vec![RESEARCHER.to_string()]);
    transitions.insert(
        RESEARCHER.to_string(),
        vec![SQL_WRITER.to_string(), ANALYST.to_string()],
    );
    transitions.insert(SQL_WRITER.to_string(), vec![RESEARCHER.to_string()]);
    transitions.insert(
        ANALYST.to_string(),
        vec![RESEARCHER.to_string(), PLANNER.to_string()],
    );

    PatternLayout {
        builtin_agents: vec![user_proxy(model_name), researcher, planner],
        roster: [USER_PROXY, RESEARCHER, PLANNER, SQL_WRITER, ANALYST]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        transitions,
        max_round: 10,
    }
}
