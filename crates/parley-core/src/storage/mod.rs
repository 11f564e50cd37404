//! Storage ports.

pub mod file_store;
