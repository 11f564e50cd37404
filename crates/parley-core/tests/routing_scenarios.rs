//! End-to-end routing scenarios against scripted providers.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};

use parley_core::agent::registry::AgentRegistry;
use parley_core::conversation::context::ConversationContext;
use parley_core::conversation::engine::RoutingEngine;
use parley_core::conversation::flow::ConversationFlow;
use parley_core::event::bus::EventBus;
use parley_core::ledger::chat_ledger::ChatLedger;
use parley_core::llm::box_provider::BoxLlmProvider;
use parley_core::llm::provider::LlmProvider;
use parley_core::llm::registry::ProviderRegistry;
use parley_core::tool::definition::{BoxTool, Tool};
use parley_core::tool::executor::ToolExecutor;
use parley_core::tool::registry::ToolRegistry;
use parley_types::agent::{Agent, AgentRole};
use parley_types::config::{ModelConfig, SelectionMethod};
use parley_types::event::{ConversationEvent, SelectionReason, TerminatedBy};
use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, ToolCall, Usage,
};
use tokio::sync::broadcast;

#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Call(&'static str),
}

/// Replays per-agent scripts, keyed by system prompt `prompt:{agent}`.
struct AgentScripts {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
}

impl AgentScripts {
    fn new(scripts: &[(&str, Vec<Reply>)]) -> Self {
        Self {
            scripts: Mutex::new(
                scripts
                    .iter()
                    .map(|(agent, replies)| (format!("prompt:{agent}"), replies.clone()))
                    .collect(),
            ),
        }
    }
}

impl LlmProvider for AgentScripts {
    fn name(&self) -> &str {
        "agent-scripts"
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        let key = request.system.clone().unwrap_or_default();
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .filter(|replies| !replies.is_empty())
            .map(|replies| replies.remove(0));
        async move {
            let Some(reply) = next else {
                return Err(LlmError::Provider {
                    message: format!("script exhausted for '{key}'"),
                });
            };
            Ok(match reply {
                Reply::Text(text) => response(text, vec![], StopReason::EndTurn),
                Reply::Call(tool) => response(
                    "",
                    vec![ToolCall {
                        id: "call-1".to_string(),
                        name: tool.to_string(),
                        arguments: r#"{"query":"badges"}"#.to_string(),
                    }],
                    StopReason::ToolUse,
                ),
            })
        }
    }
}

/// Manager model that always names the same speaker.
struct StubbornManager {
    pick: &'static str,
    calls: Arc<Mutex<u32>>,
}

impl LlmProvider for StubbornManager {
    fn name(&self) -> &str {
        "manager"
    }

    fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        *self.calls.lock().unwrap() += 1;
        let pick = self.pick;
        async move { Ok(response(pick, vec![], StopReason::EndTurn)) }
    }
}

struct FailingLookup;

impl Tool for FailingLookup {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Looks up records."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    fn run(
        &self,
        _args: serde_json::Value,
    ) -> impl Future<Output = anyhow::Result<String>> + Send {
        async { Err(anyhow::anyhow!("records backend offline")) }
    }
}

fn response(content: &str, tool_calls: Vec<ToolCall>, stop_reason: StopReason) -> CompletionResponse {
    CompletionResponse {
        id: "r".to_string(),
        content: content.to_string(),
        tool_calls,
        model: "m".to_string(),
        stop_reason,
        usage: Usage {
            input_tokens: 5,
            output_tokens: 1,
        },
    }
}

fn agent(name: &str, role: AgentRole) -> Agent {
    Agent::new(name, role, "m", format!("prompt:{name}"))
}

fn registry(agents: Vec<Agent>) -> AgentRegistry {
    let mut registry = AgentRegistry::from_agents(agents).unwrap();
    registry
        .bind_models(&[ModelConfig::named("m"), ModelConfig::named("manager")])
        .unwrap();
    registry
}

fn transitions(edges: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    edges
        .iter()
        .map(|(from, to)| (from.to_string(), to.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn engine(scripts: AgentScripts, manager: Option<StubbornManager>, tools: ToolRegistry) -> RoutingEngine {
    let mut providers = ProviderRegistry::new();
    providers.register("m", BoxLlmProvider::new(scripts));
    if let Some(manager) = manager {
        providers.register("manager", BoxLlmProvider::new(manager));
    }
    RoutingEngine::new(
        Arc::new(providers),
        ToolExecutor::new(Arc::new(tools)),
        EventBus::new(256),
    )
}

fn drain(rx: &mut broadcast::Receiver<ConversationEvent>) -> Vec<ConversationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn planner_loop(max_round: u32) -> ConversationFlow {
    let registry = registry(vec![
        agent("user_proxy", AgentRole::UserProxy),
        agent("planner", AgentRole::Planner),
        agent("researcher", AgentRole::Researcher),
    ]);
    let edges = transitions(&[
        ("user_proxy", &["planner"]),
        ("planner", &["researcher"]),
        ("researcher", &["planner"]),
    ]);
    ConversationFlow::new("loop", "user_proxy", registry, &edges, max_round).unwrap()
}

#[tokio::test]
async fn marker_from_researcher_ends_conversation() {
    let engine = engine(
        AgentScripts::new(&[
            ("planner", vec![Reply::Text("researcher, please answer")]),
            ("researcher", vec![Reply::Text("Gloves are required. TERMINATE")]),
        ]),
        None,
        ToolRegistry::new(),
    );
    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&planner_loop(10), &ConversationContext::new("a"), "Do I need gloves?", &mut ledger)
        .await
        .unwrap();

    assert_eq!(outcome.terminated_by, TerminatedBy::Marker);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.summary, "Gloves are required. TERMINATE");
    assert_eq!(ledger.len(), 2);
}

#[tokio::test]
async fn round_budget_returns_last_message() {
    let engine = engine(
        AgentScripts::new(&[("planner", vec![Reply::Text("still planning")])]),
        None,
        ToolRegistry::new(),
    );
    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&planner_loop(2), &ConversationContext::new("b"), "question", &mut ledger)
        .await
        .unwrap();

    assert_eq!(outcome.terminated_by, TerminatedBy::RoundBudget);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.summary, "still planning");
}

#[tokio::test]
async fn failed_tool_is_folded_into_one_turn() {
    let mut tools = ToolRegistry::new();
    tools.register(BoxTool::new(FailingLookup));
    let engine = engine(
        AgentScripts::new(&[(
            "planner",
            vec![Reply::Call("lookup"), Reply::Text("lookup failed, no badge data")],
        )]),
        None,
        tools,
    );
    let registry = registry(vec![
        agent("user_proxy", AgentRole::UserProxy),
        agent("planner", AgentRole::Planner).with_tools(vec!["lookup".to_string()]),
    ]);
    let flow = ConversationFlow::new(
        "tools",
        "user_proxy",
        registry,
        &transitions(&[("user_proxy", &["planner"])]),
        5,
    )
    .unwrap();

    let mut rx = engine.events().subscribe();
    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&flow, &ConversationContext::new("c"), "who has a badge?", &mut ledger)
        .await
        .unwrap();
    assert_eq!(outcome.summary, "lookup failed, no badge data");

    assert_eq!(ledger.len(), 1);
    let turn = &ledger.entries()[0];
    assert_eq!(turn.response(), "lookup failed, no badge data");
    assert_eq!(turn.tool_results().len(), 1);
    assert!(turn.tool_results()[0].is_error);
    assert!(turn.tool_results()[0].content.contains("records backend offline"));
    // two model calls, both counted in the single turn
    assert_eq!(ledger.aggregate_tokens().total(), 12);

    let events = drain(&mut rx);
    let tool_at = events
        .iter()
        .position(|e| matches!(e, ConversationEvent::ToolExecuted { is_error: true, .. }))
        .unwrap();
    let finalized_at = events
        .iter()
        .position(|e| matches!(e, ConversationEvent::TurnFinalized { .. }))
        .unwrap();
    assert!(tool_at < finalized_at);
}

#[tokio::test]
async fn outside_pick_retries_then_falls_back() {
    let calls = Arc::new(Mutex::new(0));
    let engine = engine(
        AgentScripts::new(&[("alpha", vec![Reply::Text("alpha here")])]),
        Some(StubbornManager {
            pick: "gamma",
            calls: calls.clone(),
        }),
        ToolRegistry::new(),
    );
    let registry = registry(vec![
        agent("user_proxy", AgentRole::UserProxy),
        agent("beta", AgentRole::Specialist),
        agent("alpha", AgentRole::Specialist),
        agent("gamma", AgentRole::Specialist),
    ]);
    let flow = ConversationFlow::new(
        "pick",
        "user_proxy",
        registry,
        &transitions(&[("user_proxy", &["beta", "alpha"])]),
        5,
    )
    .unwrap()
    .with_selection(SelectionMethod::Auto, 1)
    .with_manager(ModelConfig::named("manager"));

    let mut rx = engine.events().subscribe();
    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&flow, &ConversationContext::new("d"), "route me", &mut ledger)
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), 2);
    assert_eq!(outcome.summary, "alpha here");
    assert_eq!(outcome.transcript[1].speaker, "alpha");

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ConversationEvent::SelectionFallback { proposed: Some(p), fallback, .. }
            if p == "gamma" && fallback == "alpha"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ConversationEvent::SpeakerSelected { reason: SelectionReason::Fallback, .. }
    )));
}

#[tokio::test]
async fn transitions_stay_in_graph_and_budget() {
    let engine = engine(
        AgentScripts::new(&[
            ("planner", vec![Reply::Text("p1"), Reply::Text("p2"), Reply::Text("p3")]),
            ("researcher", vec![Reply::Text("r1"), Reply::Text("r2")]),
            ("analyst", vec![Reply::Text("a1"), Reply::Text("a2")]),
        ]),
        None,
        ToolRegistry::new(),
    );
    let registry = registry(vec![
        agent("user_proxy", AgentRole::UserProxy),
        agent("planner", AgentRole::Planner),
        agent("researcher", AgentRole::Researcher),
        agent("analyst", AgentRole::Specialist),
    ]);
    let edges = transitions(&[
        ("user_proxy", &["planner"]),
        ("planner", &["researcher", "analyst"]),
        ("researcher", &["planner"]),
        ("analyst", &["planner"]),
    ]);
    let flow = ConversationFlow::new("rr", "user_proxy", registry, &edges, 6)
        .unwrap()
        .with_selection(SelectionMethod::RoundRobin, 0);

    let mut rx = engine.events().subscribe();
    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&flow, &ConversationContext::new("e"), "go", &mut ledger)
        .await
        .unwrap();

    assert!(outcome.rounds <= flow.max_round());
    assert_eq!(outcome.terminated_by, TerminatedBy::RoundBudget);

    let speakers: Vec<&str> = outcome.transcript.iter().map(|m| m.speaker.as_str()).collect();
    assert_eq!(
        speakers,
        vec!["user_proxy", "planner", "researcher", "planner", "analyst", "planner"]
    );
    for event in drain(&mut rx) {
        if let ConversationEvent::SpeakerSelected { previous, speaker, .. } = event {
            assert!(flow.graph().contains(&previous, &speaker));
        }
    }
}

fn single_planner(planner: Agent) -> ConversationFlow {
    let registry = registry(vec![agent("user_proxy", AgentRole::UserProxy), planner]);
    ConversationFlow::new(
        "single",
        "user_proxy",
        registry,
        &transitions(&[("user_proxy", &["planner"])]),
        5,
    )
    .unwrap()
}

#[tokio::test]
async fn call_from_agent_without_tools_becomes_error_result() {
    let engine = engine(
        AgentScripts::new(&[("planner", vec![Reply::Call("ghost"), Reply::Text("after")])]),
        None,
        ToolRegistry::new(),
    );
    let flow = single_planner(agent("planner", AgentRole::Planner));

    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&flow, &ConversationContext::new("f"), "q", &mut ledger)
        .await
        .unwrap();

    assert_eq!(outcome.summary, "after");
    assert_eq!(ledger.len(), 1);
    let turn = &ledger.entries()[0];
    assert_eq!(turn.response(), "after");
    assert_eq!(turn.tool_results().len(), 1);
    assert!(turn.tool_results()[0].is_error);
    assert_eq!(
        turn.tool_results()[0].content,
        "tool 'ghost' is not available to agent 'planner'"
    );
}

#[tokio::test]
async fn ungranted_tool_name_continues_with_error_result() {
    let mut tools = ToolRegistry::new();
    tools.register(BoxTool::new(FailingLookup));
    let engine = engine(
        AgentScripts::new(&[(
            "planner",
            vec![Reply::Call("search"), Reply::Text("no search tool, answering directly")],
        )]),
        None,
        tools,
    );
    let flow = single_planner(
        agent("planner", AgentRole::Planner).with_tools(vec!["lookup".to_string()]),
    );

    let mut rx = engine.events().subscribe();
    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&flow, &ConversationContext::new("g"), "q", &mut ledger)
        .await
        .unwrap();

    assert_eq!(outcome.summary, "no search tool, answering directly");
    assert_eq!(ledger.len(), 1);
    let result = &ledger.entries()[0].tool_results()[0];
    assert!(result.is_error);
    assert_eq!(result.tool_name, "search");
    assert!(result.content.contains("not available to agent 'planner'"));
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        ConversationEvent::ToolExecuted { tool, is_error: true, .. } if tool == "search"
    )));
}

#[tokio::test]
async fn exhausted_tool_budget_finalizes_with_last_result() {
    let mut tools = ToolRegistry::new();
    tools.register(BoxTool::new(FailingLookup));
    let engine = engine(
        AgentScripts::new(&[("planner", vec![Reply::Call("lookup"), Reply::Call("lookup")])]),
        None,
        tools,
    )
    .with_max_tool_iterations(1);
    let flow = single_planner(
        agent("planner", AgentRole::Planner).with_tools(vec!["lookup".to_string()]),
    );

    let mut ledger = ChatLedger::new();
    let outcome = engine
        .run(&flow, &ConversationContext::new("h"), "q", &mut ledger)
        .await
        .unwrap();

    assert_eq!(ledger.len(), 1);
    let turn = &ledger.entries()[0];
    assert_eq!(turn.tool_results().len(), 2);
    assert!(!turn.response().is_empty());
    assert!(turn.response().contains("records backend offline"));
    assert_eq!(outcome.summary, turn.response());
}
