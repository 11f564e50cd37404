//! Per-conversation execution context.
//!
//! `ConversationContext` carries the identifiers that correlate a run with
//! its thread and the cancellation token the caller can use to stop it.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ConversationContext {
    /// Unique identifier of this run (UUID v7).
    pub conversation_id: Uuid,
    /// Thread the run belongs to; also the identifier stamped on each turn.
    pub thread_id: String,
    pub cancellation: CancellationToken,
}

impl ConversationContext {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Uuid::now_v7(),
            thread_id: thread_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, so the caller can cancel the run.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_not_cancelled() {
        let ctx = ConversationContext::new("thread-1");
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.thread_id, "thread-1");
    }

    #[test]
    fn external_token_cancels_context() {
        let parent = CancellationToken::new();
        let ctx = ConversationContext::new("t").with_cancellation(parent.child_token());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn cancelling_context_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let ctx = ConversationContext::new("t").with_cancellation(parent.child_token());
        ctx.cancel();
        assert!(!parent.is_cancelled());
    }
}
