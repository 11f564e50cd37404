//! Agent roster management.

pub mod registry;
