//! RoutingEngine: drives a bounded multi-agent conversation.
//!
//! Each round the engine asks the selector for the next speaker among the
//! graph's allowed successors, lets that agent take its turn (folding any
//! tool-call exchange into one finalized `AgentChat`), records the turn in
//! the ledger, and evaluates termination. OTel GenAI spans instrument every
//! model call; lifecycle events go to the `EventBus`.

use std::sync::Arc;
use std::time::Instant;

use parley_types::agent::{Agent, AgentRole};
use parley_types::chat::{ExecutionResult, PendingChat, TokenUsage, TranscriptMessage};
use parley_types::error::{ConfigError, ConversationError};
use parley_types::event::{ConversationEvent, SelectionReason, TerminatedBy};
use parley_types::llm::{CompletionRequest, Message};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::context::ConversationContext;
use super::flow::ConversationFlow;
use super::selector::{SelectionRequest, SpeakerSelector};
use super::state::RoundState;
use crate::event::bus::EventBus;
use crate::ledger::chat_ledger::ChatLedger;
use crate::llm::registry::ProviderRegistry;
use crate::tool::executor::ToolExecutor;

/// Default bound on model round-trips per turn while tools are requested.
pub const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 5;

/// Result of a completed conversation.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    /// Last non-empty message of the transcript, verbatim.
    pub summary: String,
    pub rounds: u32,
    pub terminated_by: TerminatedBy,
    pub transcript: Vec<TranscriptMessage>,
}

/// Shared, stateless conversation driver.
///
/// All per-run state lives in `RoundState`, the selector, and the caller's
/// `ChatLedger`, so one engine serves many concurrent conversations.
#[derive(Clone)]
pub struct RoutingEngine {
    providers: Arc<ProviderRegistry>,
    tools: ToolExecutor,
    events: EventBus,
    max_tool_iterations: u32,
}

impl RoutingEngine {
    pub fn new(providers: Arc<ProviderRegistry>, tools: ToolExecutor, events: EventBus) -> Self {
        Self {
            providers,
            tools,
            events,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }

    pub fn with_max_tool_iterations(mut self, max_tool_iterations: u32) -> Self {
        self.max_tool_iterations = max_tool_iterations;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run `flow` from `seed` until termination.
    ///
    /// Finalized turns are appended to `ledger`. Cancellation is checked
    /// before every round; an in-flight model call runs to completion.
    pub async fn run(
        &self,
        flow: &ConversationFlow,
        ctx: &ConversationContext,
        seed: &str,
        ledger: &mut ChatLedger,
    ) -> Result<ConversationOutcome, ConversationError> {
        let span = info_span!(
            "conversation",
            conversation.id = %ctx.conversation_id,
            conversation.flow = %flow.name(),
            conversation.thread = %ctx.thread_id,
        );

        let result = self.drive(flow, ctx, seed, ledger).instrument(span).await;
        match &result {
            Ok(outcome) => self.events.publish(ConversationEvent::ConversationCompleted {
                conversation_id: ctx.conversation_id,
                rounds: outcome.rounds,
                terminated_by: outcome.terminated_by,
            }),
            Err(e) => self.events.publish(ConversationEvent::ConversationFailed {
                conversation_id: ctx.conversation_id,
                error: e.to_string(),
            }),
        }
        result
    }

    async fn drive(
        &self,
        flow: &ConversationFlow,
        ctx: &ConversationContext,
        seed: &str,
        ledger: &mut ChatLedger,
    ) -> Result<ConversationOutcome, ConversationError> {
        let registry = flow.registry();
        let mut selector = SpeakerSelector::new(
            flow.selection_method(),
            flow.max_selection_retries(),
            flow.manager().cloned(),
        );
        let mut state = RoundState::seeded(flow.entry_agent(), seed);

        info!(entry_agent = %flow.entry_agent(), max_round = flow.max_round(), "conversation started");
        self.events.publish(ConversationEvent::ConversationStarted {
            conversation_id: ctx.conversation_id,
            flow: flow.name().to_string(),
            thread_id: ctx.thread_id.clone(),
            entry_agent: flow.entry_agent().to_string(),
            max_round: flow.max_round(),
        });

        let terminated_by = loop {
            if let Some(cause) = state.evaluate(flow.max_round()) {
                break cause;
            }
            if ctx.is_cancelled() {
                info!(round = state.round(), "conversation cancelled");
                return Err(ConversationError::Cancelled);
            }

            let current = state.speaker().to_string();
            let candidates = flow.graph().allowed_next(&current);
            if candidates.is_empty() {
                state.finish(TerminatedBy::NoCandidates);
                break TerminatedBy::NoCandidates;
            }
            for candidate in candidates {
                if !registry.contains(candidate) {
                    return Err(ConfigError::UnknownAgent(candidate.clone()).into());
                }
            }

            let round = state.round() + 1;
            let selection = selector
                .select(
                    SelectionRequest {
                        current: &current,
                        candidates,
                        registry,
                        transcript: state.transcript(),
                    },
                    &self.providers,
                )
                .await?;

            if selection.reason == SelectionReason::Fallback {
                self.events.publish(ConversationEvent::SelectionFallback {
                    conversation_id: ctx.conversation_id,
                    round,
                    previous: current.clone(),
                    proposed: selection.proposed.clone(),
                    fallback: selection.speaker.clone(),
                });
            }
            self.events.publish(ConversationEvent::SpeakerSelected {
                conversation_id: ctx.conversation_id,
                round,
                previous: current.clone(),
                speaker: selection.speaker.clone(),
                reason: selection.reason,
            });

            let agent = registry.resolve(&selection.speaker)?;
            state.begin_turn(&agent.name);

            let round_span = info_span!("round", round, speaker = %agent.name, role = %agent.role);
            let content = match agent.role {
                AgentRole::UserProxy => {
                    debug!(parent: &round_span, "user proxy auto-reply");
                    agent.auto_reply.clone()
                }
                AgentRole::Planner | AgentRole::Researcher | AgentRole::Specialist => {
                    self.take_turn(agent, &state, ctx, round, ledger)
                        .instrument(round_span)
                        .await?
                }
            };
            state.record_message(content);
        };

        let rounds = state.round();
        let summary = state.summary();
        info!(rounds, terminated_by = %terminated_by, "conversation finished");
        Ok(ConversationOutcome {
            summary,
            rounds,
            terminated_by,
            transcript: state.into_transcript(),
        })
    }

    /// One model-backed turn, including its private tool exchange.
    ///
    /// Only the resolved non-tool response is finalized into the ledger.
    async fn take_turn(
        &self,
        agent: &Agent,
        state: &RoundState,
        ctx: &ConversationContext,
        round: u32,
        ledger: &mut ChatLedger,
    ) -> Result<String, ConversationError> {
        let model = agent.model.as_ref().ok_or_else(|| ConfigError::UnknownModel {
            agent: agent.name.clone(),
            model: agent.model_name.clone(),
        })?;
        let provider = self.providers.resolve(&model.model)?;

        let (source, prompt) = state
            .transcript()
            .iter()
            .rev()
            .find(|m| m.speaker != agent.name)
            .map(|m| (m.speaker.clone(), m.content.clone()))
            .unwrap_or_default();
        let pending = PendingChat::new(source, &agent.name, prompt, &agent.system_prompt)
            .with_identifier(&ctx.thread_id);

        let mut exchange = transcript_messages(agent, state.transcript());
        let tools = self.tools.visible_tools(agent);
        let mut usage = TokenUsage::default();
        let mut tool_results: Vec<ExecutionResult> = Vec::new();
        let mut iterations = 0;

        let content = loop {
            let offer_tools = !tools.is_empty() && iterations < self.max_tool_iterations;
            let request = CompletionRequest {
                model: model.model.clone(),
                messages: exchange.clone(),
                system: (!agent.system_prompt.is_empty()).then(|| agent.system_prompt.clone()),
                tools: if offer_tools { tools.clone() } else { Vec::new() },
                max_tokens: model.max_tokens,
                temperature: model.temperature,
            };

            let span = info_span!(
                "gen_ai.complete",
                gen_ai.system = provider.name(),
                gen_ai.request.model = %request.model,
                gen_ai.request.max_tokens = request.max_tokens,
                gen_ai.request.temperature = ?request.temperature,
                gen_ai.agent.name = %agent.name,
                tool_iteration = iterations,
            );
            let response = provider.complete(&request).instrument(span).await?;
            usage += TokenUsage::from(response.usage);
            debug!(
                gen_ai.usage.input_tokens = response.usage.input_tokens,
                gen_ai.usage.output_tokens = response.usage.output_tokens,
                gen_ai.response.finish_reasons = %response.stop_reason,
                "model call finished"
            );

            if !response.has_tool_calls() {
                break response.content;
            }

            // Runs even when no tools were offered; invisible tools come back
            // from the executor as error results.
            exchange.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let started = Instant::now();
                let result = match self.tools.execute(agent, call).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(agent = %agent.name, tool = %call.name, error = %e, "tool call rejected");
                        ExecutionResult::error(&call.id, &call.name, e.to_string())
                    }
                };
                self.events.publish(ConversationEvent::ToolExecuted {
                    conversation_id: ctx.conversation_id,
                    round,
                    agent: agent.name.clone(),
                    tool: call.name.clone(),
                    is_error: result.is_error,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                exchange.push(Message::tool_result(&result.call_id, &result.content));
                tool_results.push(result);
            }

            if iterations >= self.max_tool_iterations {
                warn!(
                    agent = %agent.name,
                    max_tool_iterations = self.max_tool_iterations,
                    "tool budget exhausted with calls still pending"
                );
                break exhausted_turn_content(response.content, &tool_results);
            }
            iterations += 1;
        };

        let chat = pending.finalize(content.clone(), tool_results, usage);
        self.events.publish(ConversationEvent::TurnFinalized {
            conversation_id: ctx.conversation_id,
            round,
            source: chat.source().to_string(),
            target: chat.target().to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        });
        ledger.record(chat);
        Ok(content)
    }
}

/// Content of a turn whose model still asked for tools after the budget ran
/// out: its own text when it has any, else the last tool result.
fn exhausted_turn_content(content: String, tool_results: &[ExecutionResult]) -> String {
    if !content.trim().is_empty() {
        return content;
    }
    tool_results
        .last()
        .map(|result| result.content.clone())
        .unwrap_or_default()
}

/// The transcript as seen by `agent`: its own messages as assistant turns,
/// everyone else's as named user turns.
fn transcript_messages(agent: &Agent, transcript: &[TranscriptMessage]) -> Vec<Message> {
    transcript
        .iter()
        .map(|m| {
            if m.speaker == agent.name {
                Message::assistant(m.content.clone())
            } else {
                Message::user(m.content.clone()).with_name(m.speaker.clone())
            }
        })
        .collect()
}
