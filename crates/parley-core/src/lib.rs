//! Business logic and port trait definitions for Parley.
//!
//! This crate defines the "ports" (provider, tool, storage and memory
//! traits) that the infrastructure layer implements. It depends only on
//! `parley-types` -- never on `parley-infra` or any HTTP/IO crate.

pub mod agent;
pub mod conversation;
pub mod event;
pub mod ledger;
pub mod llm;
pub mod memory;
pub mod service;
pub mod storage;
pub mod tool;
