use thiserror::Error;

use crate::llm::LlmError;

/// Configuration errors. Always fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("agent '{agent}' declares model '{model}' which is not in the model catalog")]
    UnknownModel { agent: String, model: String },

    #[error("agent '{0}' is registered more than once")]
    DuplicateAgent(String),

    #[error("agent '{0}' is not registered")]
    UnknownAgent(String),

    #[error("transition '{from}' -> '{to}' references an unregistered agent")]
    InvalidGraph { from: String, to: String },

    #[error("conversation flow '{0}' is not configured")]
    UnknownFlow(String),

    #[error("no provider registered for model '{0}'")]
    MissingProvider(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Lookup failures in a name-keyed registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("'{0}' not found")]
    NotFound(String),
}

/// Errors from tool resolution and invocation.
///
/// The engine converts these into in-band error results, so they never
/// abort a conversation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{tool}' is not available to agent '{agent}'")]
    Unavailable { agent: String, tool: String },

    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

/// File store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path '{0}' escapes the storage root")]
    InvalidPath(String),

    #[error("'{0}' not found")]
    NotFound(String),
}

/// Everything that can abort a conversation.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    NotFound(#[from] RegistryError),

    #[error("provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("conversation cancelled")]
    Cancelled,
}
