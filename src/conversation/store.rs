//! Ordered, role-tagged message store

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::persona::Persona;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Capitalized label used in rendered transcripts
    #[must_use]
    pub const fn as_display_str(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_display_str())
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chronological dialogue history
///
/// Position 0 holds the system anchor once [`Conversation::ensure_system_anchor`]
/// has run. Messages are never edited in place; the only rewrite is the
/// compactor's prefix replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Create a conversation from existing messages
    #[must_use]
    pub const fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Insert the persona's system anchor at position 0 if none is there
    ///
    /// Returns true if an anchor was inserted.
    pub fn ensure_system_anchor(&mut self, persona: &Persona) -> bool {
        if self.anchor().is_some() {
            return false;
        }

        self.messages
            .insert(0, Message::system(persona.compose_system_prompt()));
        tracing::debug!(persona = %persona.id, "inserted system anchor");
        true
    }

    /// Append a user message
    ///
    /// Blank text is rejected; returns false without changing the store.
    pub fn append_user(&mut self, text: &str) -> bool {
        self.append(Message::user(text))
    }

    /// Append an assistant message
    ///
    /// Blank text is rejected; returns false without changing the store.
    pub fn append_assistant(&mut self, text: &str) -> bool {
        self.append(Message::assistant(text))
    }

    fn append(&mut self, message: Message) -> bool {
        if message.content.trim().is_empty() {
            tracing::debug!(role = %message.role, "ignoring blank message");
            return false;
        }
        self.messages.push(message);
        true
    }

    /// The trailing `max_messages` messages in chronological order
    #[must_use]
    pub fn window_for_request(&self, max_messages: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(max_messages);
        &self.messages[start..]
    }

    /// Replace `count` messages after the anchor with a single summary note
    ///
    /// The new sequence is built in full before it is swapped in, so no
    /// caller ever observes the prefix removed without the summary present.
    pub(crate) fn replace_prefix(&mut self, count: usize, summary: Message) {
        let end = (1 + count).min(self.messages.len());
        let mut rebuilt = Vec::with_capacity(self.messages.len() - end + 2);
        rebuilt.extend(self.messages.first().cloned());
        rebuilt.push(summary);
        rebuilt.extend_from_slice(&self.messages[end..]);
        self.messages = rebuilt;
    }

    /// The leading system message, if present
    #[must_use]
    pub fn anchor(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.role == Role::System)
    }

    /// All messages
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
