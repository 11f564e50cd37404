//! Turn records, transcripts, and the request/response envelope.
//!
//! A logical turn starts as a [`PendingChat`] and only becomes an
//! [`AgentChat`] through [`PendingChat::finalize`]. Intermediate tool-call
//! exchanges never produce an `AgentChat`, so they cannot reach the ledger.

use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Usage;

/// Prompt/completion token counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        Self::new(usage.input_tokens, usage.output_tokens)
    }
}

/// Outcome of one tool call, fed back to the model as a tool message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

impl ExecutionResult {
    pub fn ok(call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            is_error: true,
            ..Self::ok(call_id, tool_name, content)
        }
    }
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub speaker: String,
    pub content: String,
    /// 1-based round in which the message was spoken.
    pub round: u32,
}

/// A turn that has started but has no resolved response yet.
#[derive(Debug, Clone)]
pub struct PendingChat {
    chat_name: String,
    source: String,
    target: String,
    message: String,
    system_prompt: String,
    identifier: Option<String>,
    start_time: DateTime<Utc>,
}

impl PendingChat {
    /// Open a turn in which `target` answers `message` sent by `source`.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let target = target.into();
        Self {
            chat_name: target.clone(),
            source: source.into(),
            target,
            message: message.into(),
            system_prompt: system_prompt.into(),
            identifier: None,
            start_time: Utc::now(),
        }
    }

    /// Correlate the turn with a thread or payload.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Close the turn now with its resolved response.
    pub fn finalize(
        self,
        response: impl Into<String>,
        tool_results: Vec<ExecutionResult>,
        usage: TokenUsage,
    ) -> AgentChat {
        self.finalize_at(Utc::now(), response, tool_results, usage)
    }

    /// Close the turn at `end_time`. An end before the start is clamped to
    /// the start.
    pub fn finalize_at(
        self,
        end_time: DateTime<Utc>,
        response: impl Into<String>,
        tool_results: Vec<ExecutionResult>,
        usage: TokenUsage,
    ) -> AgentChat {
        AgentChat {
            chat_name: self.chat_name,
            source: self.source,
            target: self.target,
            message: self.message,
            system_prompt: self.system_prompt,
            identifier: self.identifier,
            response: response.into(),
            tool_results,
            usage,
            start_time: self.start_time,
            end_time: end_time.max(self.start_time),
        }
    }
}

/// A finalized turn: who spoke to whom, what was said, and what it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentChat {
    chat_name: String,
    source: String,
    target: String,
    message: String,
    system_prompt: String,
    identifier: Option<String>,
    response: String,
    tool_results: Vec<ExecutionResult>,
    usage: TokenUsage,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl AgentChat {
    pub fn chat_name(&self) -> &str {
        &self.chat_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn tool_results(&self) -> &[ExecutionResult] {
        &self.tool_results
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Wall-clock duration of the turn in seconds.
    pub fn execution_time_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// Duration as `m:ss`.
    pub fn execution_time_formatted(&self) -> String {
        let secs = (self.end_time - self.start_time).num_seconds().max(0);
        format!("{}:{:02}", secs / 60, secs % 60)
    }

    /// Start time as `HH:MM:SS` (UTC).
    pub fn start_time_formatted(&self) -> String {
        self.start_time.format("%H:%M:%S").to_string()
    }

    /// File name of the persisted audit artifact for this turn.
    pub fn artifact_file_name(&self, event_type: &str, identifier: &str) -> String {
        format!(
            "agent_response_{event_type}_{}_{}_{}.md",
            self.source,
            self.target,
            identifier.trim()
        )
    }
}

fn default_true() -> bool {
    true
}

/// A chat request as received from a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub thread_id: Option<String>,
    pub user_prompt: String,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_true")]
    pub memory_record: bool,
    pub conversation_flow: String,
    /// Explicit prior memory; wins over the stored thread memory.
    #[serde(default)]
    pub thread_memory: Option<String>,
}

impl ChatRequest {
    pub fn new(conversation_flow: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            thread_id: None,
            user_prompt: user_prompt.into(),
            event_type: None,
            user_id: None,
            user_name: None,
            topic: None,
            memory_record: true,
            conversation_flow: conversation_flow.into(),
            thread_memory: None,
        }
    }
}

/// The answer returned for a [`ChatRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub thread_id: String,
    pub message_id: String,
    pub agent_response: String,
    pub token_count: u32,
    pub max_token_count: u32,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub memory_summary: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    /// Turns from agents flagged `include_in_response`.
    #[serde(default)]
    pub agent_chats: Vec<AgentChat>,
}
