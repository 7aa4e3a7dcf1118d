//! Conversation state for a co-pilot session
//!
//! Combines:
//! - The rolling message store with its system anchor
//! - Compaction of older turns into a summary note

mod compaction;
mod store;

pub use compaction::{CompactionConfig, CompactionOutcome, HistoryCompactor, MIN_THRESHOLD};
pub use store::{Conversation, Message, Role};
