//! Termination predicate.

use parley_types::event::TerminatedBy;

/// Literal token an agent emits to end the conversation.
pub const TERMINATION_MARKER: &str = "TERMINATE";

/// Whether `content` carries the termination marker (case-insensitive).
pub fn contains_marker(content: &str) -> bool {
    content.to_uppercase().contains(TERMINATION_MARKER)
}

/// Decide whether the conversation stops after `latest` was spoken in `round`.
///
/// The marker wins over the round budget when both apply.
pub fn evaluate(latest: &str, round: u32, max_round: u32) -> Option<TerminatedBy> {
    if contains_marker(latest) {
        Some(TerminatedBy::Marker)
    } else if round >= max_round {
        Some(TerminatedBy::RoundBudget)
    } else {
        None
    }
}
