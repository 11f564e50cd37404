//! Observability setup for Parley: structured logging plus optional
//! OpenTelemetry span export.
//!
//! Spans emitted by `parley-core` use the OTel GenAI semantic-convention
//! field names (`gen_ai.system`, `gen_ai.request.model`,
//! `gen_ai.usage.input_tokens`, ...), so the OTel layer exports them as
//! GenAI attributes without any mapping.

pub mod tracing_setup;
