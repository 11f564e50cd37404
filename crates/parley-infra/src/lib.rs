//! Infrastructure layer for Parley.
//!
//! Contains implementations of the port traits defined in `parley-core`:
//! the OpenAI-compatible model provider, the local file store, file-backed
//! thread memory, and the TOML configuration loader.

pub mod config;
pub mod llm;
pub mod memory;
pub mod storage;
