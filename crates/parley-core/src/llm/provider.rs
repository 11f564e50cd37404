//! LlmProvider trait definition.
//!
//! This is the port every model-completion backend implements. Uses RPITIT
//! (native async fn in traits) for `complete`.

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for model-completion backends (OpenAI, Azure OpenAI, test doubles).
///
/// Implementations live in parley-infra (e.g., `OpenAiCompatibleProvider`).
/// The engine only ever calls `complete`; an in-flight call is never
/// cancelled, so implementations should carry their own request timeout.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai", "azure").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
