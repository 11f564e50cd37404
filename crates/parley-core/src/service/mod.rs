//! Business logic services (use cases).
//!
//! Services orchestrate the engine, memory and storage ports. They depend
//! on traits, never on concrete infrastructure implementations.

pub mod chat;
