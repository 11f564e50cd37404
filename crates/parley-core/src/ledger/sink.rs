//! Delivery targets for finalized turns.

use parley_types::chat::AgentChat;
use parley_types::event::ConversationEvent;
use tokio::sync::mpsc;
use tracing::debug;

use crate::event::bus::EventBus;

/// Receives each delivered turn exactly once.
pub trait ChatSink {
    fn deliver(&mut self, chat: AgentChat);
}

/// Collects turns in memory, e.g. to assemble a response.
impl ChatSink for Vec<AgentChat> {
    fn deliver(&mut self, chat: AgentChat) {
        self.push(chat);
    }
}

/// Forwards turns to a live-feed channel. A closed receiver drops the turn.
impl ChatSink for mpsc::UnboundedSender<AgentChat> {
    fn deliver(&mut self, chat: AgentChat) {
        if self.send(chat).is_err() {
            debug!("live feed receiver closed; turn dropped");
        }
    }
}

/// Publishes turns as `ConversationEvent::ChatDelivered`.
impl ChatSink for EventBus {
    fn deliver(&mut self, chat: AgentChat) {
        self.publish(ConversationEvent::ChatDelivered { chat });
    }
}
