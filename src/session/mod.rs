//! Session controller
//!
//! Push-to-talk state machine: a toggle starts capture, the next toggle
//! stops it, sends the combined transcript to the chat responder and speaks
//! the reply in the persona's voice.
//!
//! ```text
//!            Toggle (persona gate, spawn capture)
//!   ┌──────┐ ───────────────────────────────────▶ ┌───────────┐
//!   │ Idle │                                      │ Capturing │
//!   └──────┘ ◀─────────────────────────────────── └───────────┘
//!            Toggle (stop capture, respond, speak)
//! ```

mod capture;

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

pub use capture::ListenSettings;

use self::capture::CaptureTask;
use crate::chat::{ChatFailure, ChatResponder};
use crate::conversation::Conversation;
use crate::input::announce;
use crate::persona::{self, Persona, PersonaId};
use crate::providers::{SpeechRecognizer, VoiceOutput};
use crate::Result;

/// Events from the input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Start capture when idle, stop and respond when capturing
    Toggle,
    /// Stop any capture and end the session
    Terminate,
}

/// Capture state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
}

/// Blocking persona prompt used the first time capture starts
pub trait PersonaSelector: Send {
    /// Ask for a persona, blocking until one is chosen
    ///
    /// # Errors
    ///
    /// Returns error if the prompt cannot be shown or read
    fn select(&self) -> Result<PersonaId>;
}

/// Selector that always answers with the same persona
#[derive(Debug, Clone, Copy)]
pub struct FixedPersona(pub PersonaId);

impl PersonaSelector for FixedPersona {
    fn select(&self) -> Result<PersonaId> {
        Ok(self.0)
    }
}

/// What a stop toggle produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Capture was not running
    NotCapturing,
    /// Nothing was heard; no collaborator was called
    Silent,
    /// The assistant replied
    Replied {
        /// Reply text
        text: String,
        /// Whether the reply was spoken aloud
        spoken: bool,
    },
    /// The chat exchange failed; the failure text was shown instead
    Failed(ChatFailure),
}

/// State owned by one controller
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    persona: Option<&'static Persona>,
    conversation: Conversation,
    state: CaptureState,
    fragments: Arc<Mutex<Vec<String>>>,
}

impl Session {
    /// Create a session, optionally with the persona already chosen
    ///
    /// # Errors
    ///
    /// Returns error if the persona is not registered
    pub fn new(persona: Option<PersonaId>) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            persona: persona.map(persona::get_persona).transpose()?,
            conversation: Conversation::new(),
            state: CaptureState::Idle,
            fragments: Arc::default(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn persona(&self) -> Option<&'static Persona> {
        self.persona
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Mutable access to the conversation, for seeding history
    pub const fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Snapshot of the fragments captured so far
    #[must_use]
    pub fn pending_fragments(&self) -> Vec<String> {
        self.fragments
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    fn take_fragments(&self) -> Vec<String> {
        self.fragments
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

/// Drives a [`Session`] from input events
pub struct SessionController {
    session: Session,
    responder: ChatResponder,
    recognizer: Arc<dyn SpeechRecognizer>,
    voice: Arc<dyn VoiceOutput>,
    selector: Box<dyn PersonaSelector>,
    listen: ListenSettings,
    capture: Option<CaptureTask>,
}

impl SessionController {
    /// Create a new controller
    #[must_use]
    pub fn new(
        session: Session,
        responder: ChatResponder,
        recognizer: Arc<dyn SpeechRecognizer>,
        voice: Arc<dyn VoiceOutput>,
        selector: Box<dyn PersonaSelector>,
        listen: ListenSettings,
    ) -> Self {
        Self {
            session,
            responder,
            recognizer,
            voice,
            selector,
            listen,
            capture: None,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Consume events until terminated or the event source closes
    ///
    /// Returns the session so its final state can be inspected.
    pub async fn run(
        mut self,
        mut events: tokio::sync::mpsc::Receiver<SessionEvent>,
    ) -> Session {
        tracing::info!(session = %self.session.id, "session started");
        announce("Ready. Press 'space' to toggle listening or 'esc' to exit.");

        loop {
            let Some(event) = events.recv().await else {
                tracing::debug!("event source closed");
                self.shutdown().await;
                break;
            };

            if self.handle(event).await.is_break() {
                break;
            }
        }

        tracing::info!(
            session = %self.session.id,
            messages = self.session.conversation.len(),
            "session ended"
        );
        self.session
    }

    /// Apply one event
    pub async fn handle(&mut self, event: SessionEvent) -> ControlFlow<()> {
        match (event, self.session.state) {
            (SessionEvent::Toggle, CaptureState::Idle) => {
                if let Err(e) = self.start_capture() {
                    tracing::error!(error = %e, "failed to start capture");
                    announce(format_args!("Could not start listening: {e}"));
                }
                ControlFlow::Continue(())
            }
            (SessionEvent::Toggle, CaptureState::Capturing) => {
                self.stop_capture().await;
                ControlFlow::Continue(())
            }
            (SessionEvent::Terminate, _) => {
                announce("Exiting...");
                self.shutdown().await;
                ControlFlow::Break(())
            }
        }
    }

    /// Toggle-on: choose a persona if needed, then start capturing
    ///
    /// No-op while already capturing.
    ///
    /// # Errors
    ///
    /// Returns error if the persona prompt or the capture thread fails;
    /// the session stays idle.
    pub fn start_capture(&mut self) -> Result<()> {
        if self.session.state == CaptureState::Capturing {
            return Ok(());
        }

        if self.session.persona.is_none() {
            let id = self.selector.select()?;
            let chosen = persona::get_persona(id)?;
            tracing::info!(persona = %id, "persona selected");
            announce(format_args!("Personality selected: {id}"));
            self.session.persona = Some(chosen);
        }

        self.session.take_fragments();
        let task = CaptureTask::spawn(
            Arc::clone(&self.recognizer),
            Arc::clone(&self.session.fragments),
            self.listen,
        )?;

        self.capture = Some(task);
        self.session.state = CaptureState::Capturing;
        tracing::debug!("capture started");
        announce("Listening... Press 'space' again to stop.");
        Ok(())
    }

    /// Toggle-off: stop capturing, respond to what was heard and speak it
    pub async fn stop_capture(&mut self) -> TurnOutcome {
        if self.session.state != CaptureState::Capturing {
            return TurnOutcome::NotCapturing;
        }

        if let Some(task) = self.capture.take() {
            task.stop().await;
        }
        self.session.state = CaptureState::Idle;

        let outcome = self.respond_to_capture().await;
        announce("Stopped listening. Press 'space' to start again or 'esc' to exit.");
        outcome
    }

    async fn respond_to_capture(&mut self) -> TurnOutcome {
        let full_text = self.session.take_fragments().join(" ");
        announce(format_args!("Full combined text: {full_text}"));

        if full_text.trim().is_empty() {
            tracing::info!("nothing captured, skipping chat");
            return TurnOutcome::Silent;
        }

        let Some(persona) = self.session.persona else {
            tracing::warn!("capture finished without a persona");
            return TurnOutcome::Silent;
        };

        match self
            .responder
            .respond(&mut self.session.conversation, persona, &full_text)
            .await
        {
            Ok(text) => {
                announce(format_args!("Chatty Copilot: {text}"));
                let spoken = match self.voice.speak(&text, persona.voice()).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to synthesize response");
                        false
                    }
                };
                TurnOutcome::Replied { text, spoken }
            }
            Err(failure) => {
                announce(format_args!("Chatty Copilot: {failure}"));
                TurnOutcome::Failed(failure)
            }
        }
    }

    /// Stop any capture without responding
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.capture.take() {
            task.stop().await;
        }
        self.session.state = CaptureState::Idle;
    }
}
