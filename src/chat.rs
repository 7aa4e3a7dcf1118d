//! Chat responder
//!
//! Drives one request/response exchange: anchors the persona, records the
//! user's words, compacts history when needed and sends the trailing window
//! to the language model.

use std::sync::Arc;

use crate::conversation::{CompactionOutcome, Conversation, HistoryCompactor};
use crate::persona::Persona;
use crate::providers::LanguageModel;

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Why an exchange produced no assistant reply
///
/// The `Display` form is meant to be shown to the user in place of a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatFailure {
    /// Nothing to send
    #[error("I didn't catch anything to respond to.")]
    EmptyInput,

    /// The model answered with no text
    #[error("An error occurred: the model returned an empty reply.")]
    EmptyReply,

    /// The chat request failed
    #[error("An error occurred: {0}")]
    RequestFailed(String),
}

/// Outcome of [`ChatResponder::respond`]
pub type ChatReply = std::result::Result<String, ChatFailure>;

/// Composes chat requests and records the exchange in the conversation
pub struct ChatResponder {
    llm: Arc<dyn LanguageModel>,
    model: String,
    compactor: HistoryCompactor,
}

impl ChatResponder {
    /// Create a new responder
    ///
    /// The compactor's threshold doubles as the request window size.
    #[must_use]
    pub fn new(llm: Arc<dyn LanguageModel>, model: String, compactor: HistoryCompactor) -> Self {
        Self {
            llm,
            model,
            compactor,
        }
    }

    /// Model identifier sent with every request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Respond to `user_text`, updating the conversation
    ///
    /// On success the reply has been appended to the full conversation.
    /// Failures never propagate as errors: they come back as a
    /// [`ChatFailure`] and leave no assistant message behind.
    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        persona: &Persona,
        user_text: &str,
    ) -> ChatReply {
        if user_text.trim().is_empty() {
            return Err(ChatFailure::EmptyInput);
        }

        conversation.ensure_system_anchor(persona);
        conversation.append_user(user_text);

        if let CompactionOutcome::Failed(reason) =
            self.compactor.compact(conversation, self.llm.as_ref()).await
        {
            tracing::debug!(
                reason = %reason,
                messages = conversation.len(),
                "sending uncompacted history"
            );
        }

        let window = conversation.window_for_request(self.compactor.threshold());
        tracing::debug!(
            persona = %persona.id,
            model = %self.model,
            window = window.len(),
            total = conversation.len(),
            "sending chat request"
        );

        let reply = match self.llm.complete(window, &self.model).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                return Err(ChatFailure::RequestFailed(e.to_string()));
            }
        };

        if !conversation.append_assistant(&reply) {
            tracing::warn!("chat model returned an empty reply");
            return Err(ChatFailure::EmptyReply);
        }

        tracing::debug!(response_len = reply.len(), "model responded");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::conversation::{CompactionConfig, Message, Role};
    use crate::persona::{PersonaId, get_persona};
    use crate::{Error, Result};

    /// Pops scripted replies in order; records requests
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<(Vec<Message>, String)>>,
    }

    impl ScriptedModel {
        fn with(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, messages: &[Message], model: &str) -> Result<String> {
            self.requests
                .lock()
                .unwrap()
                .push((messages.to_vec(), model.to_string()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Llm("script exhausted".to_string())))
        }
    }

    fn responder(llm: Arc<ScriptedModel>) -> ChatResponder {
        let compactor = HistoryCompactor::new(CompactionConfig::default(), DEFAULT_MODEL.into());
        ChatResponder::new(llm, DEFAULT_MODEL.to_string(), compactor)
    }

    fn professional() -> &'static Persona {
        get_persona(PersonaId::Professional).unwrap()
    }

    #[tokio::test]
    async fn fresh_conversation_sends_anchor_and_user() {
        let llm = ScriptedModel::with(vec![Ok("Flight level three five zero.".into())]);
        let responder = responder(Arc::clone(&llm));
        let mut conversation = Conversation::new();

        let reply = responder
            .respond(&mut conversation, professional(), "What's our altitude?")
            .await;

        assert_eq!(reply.unwrap(), "Flight level three five zero.");
        let requests = llm.requests.lock().unwrap();
        let (window, model) = &requests[0];
        assert_eq!(model, DEFAULT_MODEL);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].role, Role::System);
        assert!(window[0].content.contains(professional().system_prompt));
        assert_eq!(window[1], Message::user("What's our altitude?"));

        assert_eq!(conversation.len(), 3);
        assert_eq!(
            conversation.last(),
            Some(&Message::assistant("Flight level three five zero."))
        );
    }

    #[tokio::test]
    async fn failure_returns_reason_and_keeps_user_turn() {
        let llm = ScriptedModel::with(vec![Err(Error::Llm("rate limited".into()))]);
        let responder = responder(llm);
        let mut conversation = Conversation::new();

        let failure = responder
            .respond(&mut conversation, professional(), "Gear status?")
            .await
            .unwrap_err();

        assert!(matches!(failure, ChatFailure::RequestFailed(_)));
        assert!(failure.to_string().contains("rate limited"));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last(), Some(&Message::user("Gear status?")));
    }

    #[tokio::test]
    async fn blank_input_short_circuits() {
        let llm = ScriptedModel::with(vec![]);
        let responder = responder(Arc::clone(&llm));
        let mut conversation = Conversation::new();

        let reply = responder.respond(&mut conversation, professional(), "  ").await;

        assert_eq!(reply, Err(ChatFailure::EmptyInput));
        assert!(conversation.is_empty());
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_not_recorded() {
        let llm = ScriptedModel::with(vec![Ok(String::new())]);
        let responder = responder(llm);
        let mut conversation = Conversation::new();

        let reply = responder.respond(&mut conversation, professional(), "Hello").await;

        assert_eq!(reply, Err(ChatFailure::EmptyReply));
        assert_eq!(conversation.last().map(|m| m.role), Some(Role::User));
    }
}
