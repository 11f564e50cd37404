//! Thread memory.

pub mod store;

/// Context used for a thread that has no stored memory yet.
pub const DEFAULT_CONTEXT: &str = "New conversation. Continue based on user question.";
