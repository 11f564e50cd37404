//! Conversation event distribution.

pub mod bus;
