//! Shared domain types for Parley.
//!
//! This crate contains the types used across the Parley workspace: agents,
//! turn records, LLM request/response shapes, configuration, events, and
//! the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
