//! History compaction
//!
//! When a conversation grows past the message threshold, the oldest half
//! threshold of turns after the anchor is summarized via the language model
//! and replaced with a single system note, keeping the request window
//! roughly constant over an arbitrarily long session.

use std::time::Duration;

use super::store::{Conversation, Message};
use crate::providers::LanguageModel;

/// Instruction heading every summarization request
const SUMMARY_PROMPT: &str = "Summarize the following conversation concisely:\n";

/// Prefix of the system note that replaces compacted turns
const SUMMARY_PREFIX: &str = "Summary: ";

/// Smallest threshold that keeps a conversation bounded
///
/// A compaction removes `threshold / 2 - 1` messages net and a turn adds
/// two, so the batch must fold at least three messages.
pub const MIN_THRESHOLD: usize = 6;

/// Configuration for history compaction
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Compact when the conversation holds more than this many messages
    pub threshold: usize,
    /// Timeout for the summarization call
    pub summarize_timeout: Duration,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            summarize_timeout: Duration::from_secs(60),
        }
    }
}

/// Result of a compaction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Conversation was within the threshold
    Skipped,
    /// Prefix replaced by a summary note
    Compacted {
        /// Number of messages folded into the summary
        removed: usize,
        /// Summary text as returned by the model
        summary: String,
    },
    /// Summarization failed; the conversation is unchanged
    Failed(String),
}

/// Summarizes older turns once the conversation outgrows its budget
#[derive(Debug, Clone)]
pub struct HistoryCompactor {
    config: CompactionConfig,
    model: String,
}

impl HistoryCompactor {
    /// Create a new compactor
    #[must_use]
    pub const fn new(config: CompactionConfig, model: String) -> Self {
        Self { config, model }
    }

    /// Message threshold that triggers compaction
    #[must_use]
    pub const fn threshold(&self) -> usize {
        self.config.threshold
    }

    /// Check if compaction is needed based on message count
    #[must_use]
    pub const fn needs_compaction(&self, message_count: usize) -> bool {
        message_count > self.config.threshold
    }

    /// Number of messages after the anchor folded into one summary
    const fn batch_size(&self) -> usize {
        self.config.threshold / 2
    }

    /// Compact the conversation if it exceeds the threshold
    ///
    /// Failure is reported in the outcome and logged; the conversation is
    /// then left exactly as it was and the caller proceeds with it.
    pub async fn compact(
        &self,
        conversation: &mut Conversation,
        llm: &dyn LanguageModel,
    ) -> CompactionOutcome {
        let batch = self.batch_size();
        if !self.needs_compaction(conversation.len()) || batch == 0 {
            return CompactionOutcome::Skipped;
        }

        let end = (1 + batch).min(conversation.len());
        let prefix = &conversation.messages()[1..end];
        let removed = prefix.len();

        let request = [Message::system(render_transcript(prefix))];
        let result = tokio::time::timeout(
            self.config.summarize_timeout,
            llm.complete(&request, &self.model),
        )
        .await;

        let summary = match result {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => return failed("summarization returned no text"),
            Ok(Err(e)) => return failed(&e.to_string()),
            Err(_) => return failed("summarization timed out"),
        };

        conversation.replace_prefix(
            removed,
            Message::system(format!("{SUMMARY_PREFIX}{summary}")),
        );

        tracing::info!(
            removed,
            remaining = conversation.len(),
            summary = %summary,
            "summarized old messages"
        );

        CompactionOutcome::Compacted { removed, summary }
    }
}

fn failed(reason: &str) -> CompactionOutcome {
    tracing::warn!(error = reason, "failed to summarize old messages");
    CompactionOutcome::Failed(reason.to_string())
}

/// Render messages as a role-labeled transcript under the summary instruction
fn render_transcript(messages: &[Message]) -> String {
    let mut prompt = String::from(SUMMARY_PROMPT);
    for message in messages {
        prompt.push_str(message.role.as_display_str());
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt
}
