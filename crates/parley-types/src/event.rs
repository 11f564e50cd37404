//! Conversation lifecycle events for the Parley event bus.
//!
//! `ConversationEvent` is broadcast by the routing engine while a
//! conversation runs. All variants are Clone + Send + Sync for use with
//! tokio broadcast channels.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::AgentChat;

/// Why a conversation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedBy {
    /// The latest message carried the termination marker.
    Marker,
    /// The round counter reached the flow's `max_round`.
    RoundBudget,
    /// The current speaker has no allowed successor.
    NoCandidates,
}

impl fmt::Display for TerminatedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminatedBy::Marker => write!(f, "marker"),
            TerminatedBy::RoundBudget => write!(f, "round_budget"),
            TerminatedBy::NoCandidates => write!(f, "no_candidates"),
        }
    }
}

/// How a speaker was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    SingleCandidate,
    Model,
    RoundRobin,
    Fallback,
}

/// Events emitted while a conversation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    ConversationStarted {
        conversation_id: Uuid,
        flow: String,
        thread_id: String,
        entry_agent: String,
        max_round: u32,
    },

    SpeakerSelected {
        conversation_id: Uuid,
        round: u32,
        previous: String,
        speaker: String,
        reason: SelectionReason,
    },

    /// The manager model never produced an allowed pick.
    SelectionFallback {
        conversation_id: Uuid,
        round: u32,
        previous: String,
        /// Last reply from the manager model, if any.
        proposed: Option<String>,
        fallback: String,
    },

    ToolExecuted {
        conversation_id: Uuid,
        round: u32,
        agent: String,
        tool: String,
        is_error: bool,
        duration_ms: u64,
    },

    TurnFinalized {
        conversation_id: Uuid,
        round: u32,
        source: String,
        target: String,
        prompt_tokens: u32,
        completion_tokens: u32,
    },

    /// A finalized turn delivered to live-feed subscribers.
    ChatDelivered { chat: AgentChat },

    ConversationCompleted {
        conversation_id: Uuid,
        rounds: u32,
        terminated_by: TerminatedBy,
    },

    ConversationFailed { conversation_id: Uuid, error: String },
}

impl ConversationEvent {
    /// Returns the conversation id for variants that carry one.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            ConversationEvent::ConversationStarted { conversation_id, .. }
            | ConversationEvent::SpeakerSelected { conversation_id, .. }
            | ConversationEvent::SelectionFallback { conversation_id, .. }
            | ConversationEvent::ToolExecuted { conversation_id, .. }
            | ConversationEvent::TurnFinalized { conversation_id, .. }
            | ConversationEvent::ConversationCompleted { conversation_id, .. }
            | ConversationEvent::ConversationFailed { conversation_id, .. } => {
                Some(*conversation_id)
            }
            ConversationEvent::ChatDelivered { .. } => None,
        }
    }
}
