//! Turn ledger: finalized turns, token accounting, delivery, and artifacts.

pub mod chat_ledger;
pub mod sink;
