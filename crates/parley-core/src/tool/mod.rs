//! Tools that agents may invoke during a turn.
//!
//! - `Tool`: RPITIT trait for concrete tools
//! - `BoxTool`: object-safe wrapper, same blanket-impl pattern as `BoxLlmProvider`
//! - `ToolRegistry`: name -> tool map shared by every flow
//! - `ToolExecutor`: per-agent visibility and in-band error conversion

pub mod executor;
pub mod registry;
pub mod definition;
