//! Multi-agent conversation routing.
//!
//! A `ConversationFlow` fixes who may speak after whom; the `RoutingEngine`
//! walks it round by round, asking the `SpeakerSelector` for each next
//! speaker and stopping on the termination marker, the round budget, or a
//! speaker with no successors.

pub mod context;
pub mod engine;
pub mod flow;
pub mod graph;
pub mod patterns;
pub mod selector;
pub mod state;
pub mod termination;
