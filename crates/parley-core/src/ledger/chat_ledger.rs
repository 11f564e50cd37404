//! `ChatLedger`: append-only record of finalized turns for one conversation.

use parley_types::chat::{AgentChat, TokenUsage};
use parley_types::error::StorageError;
use tracing::{debug, warn};

use super::sink::ChatSink;
use crate::agent::registry::AgentRegistry;
use crate::storage::file_store::FileStore;

/// Where audit artifacts for a conversation are written.
#[derive(Debug, Clone)]
pub struct ArtifactTarget {
    /// Root directory, e.g. `functional_test_outputs`.
    pub output_dir: String,
    pub revision_id: String,
    pub event_type: String,
    /// Correlates artifacts with a thread or payload.
    pub identifier: String,
}

impl ArtifactTarget {
    /// Store path of the artifact for `chat`.
    pub fn path_for(&self, chat: &AgentChat) -> String {
        format!(
            "{}/{}/{}",
            self.output_dir.trim_end_matches('/'),
            self.revision_id,
            chat.artifact_file_name(&self.event_type, &self.identifier)
        )
    }
}

/// Finalized turns of one conversation, in arrival order.
///
/// Only [`AgentChat`] values can be recorded, and those only come from
/// `PendingChat::finalize`, so provisional tool exchanges never appear here.
#[derive(Debug, Default)]
pub struct ChatLedger {
    entries: Vec<AgentChat>,
    delivered: usize,
    usage: TokenUsage,
}

impl ChatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, chat: AgentChat) {
        self.usage += chat.usage();
        self.entries.push(chat);
    }

    /// Summed prompt/completion tokens since creation or the last `reset`.
    pub fn aggregate_tokens(&self) -> TokenUsage {
        self.usage
    }

    /// Zero the token counters. Recorded entries are kept.
    pub fn reset(&mut self) {
        self.usage = TokenUsage::default();
    }

    pub fn entries(&self) -> &[AgentChat] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver every turn not yet delivered to `sink`.
    ///
    /// Turns whose target agent has neither `log_to_audit` nor
    /// `include_in_response` are skipped. Each turn is considered once,
    /// even across repeated calls. Returns the number delivered.
    pub fn drain_to<S: ChatSink + ?Sized>(&mut self, sink: &mut S, registry: &AgentRegistry) -> usize {
        let mut count = 0;
        for chat in &self.entries[self.delivered..] {
            match registry.resolve(chat.target()) {
                Ok(agent) if agent.is_delivered() => {
                    sink.deliver(chat.clone());
                    count += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(target_agent = %chat.target(), error = %e, "turn for unknown agent not delivered"),
            }
        }
        self.delivered = self.entries.len();
        count
    }

    /// Write one JSON artifact for `chat` if its target agent is audited.
    ///
    /// Returns whether an artifact was written.
    pub async fn persist<F: FileStore>(
        chat: &AgentChat,
        store: &F,
        registry: &AgentRegistry,
        target: &ArtifactTarget,
    ) -> Result<bool, StorageError> {
        let audited = registry
            .resolve(chat.target())
            .map(|agent| agent.log_to_audit)
            .unwrap_or(false);
        if !audited {
            return Ok(false);
        }

        let path = target.path_for(chat);
        let content = serde_json::to_string_pretty(chat)
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
        store.write(&path, &content).await?;
        debug!(path = %path, "turn artifact written");
        Ok(true)
    }

    /// Persist every recorded turn. Returns the number of artifacts written.
    pub async fn persist_all<F: FileStore>(
        &self,
        store: &F,
        registry: &AgentRegistry,
        target: &ArtifactTarget,
    ) -> Result<usize, StorageError> {
        let mut written = 0;
        for chat in &self.entries {
            if Self::persist(chat, store, registry, target).await? {
                written += 1;
            }
        }
        Ok(written)
    }
}
