//! Model-completion provider abstractions.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `ProviderRegistry`: model name -> provider lookup

pub mod box_provider;
pub mod provider;
pub mod registry;
