//! External collaborators
//!
//! Each collaborator sits behind a narrow trait so the conversation core
//! and the session controller never depend on a concrete service.

mod azure;
mod openai;
mod whisper;

use std::time::Duration;

use async_trait::async_trait;

pub use azure::{AzureSpeech, MutedVoice};
pub use openai::{OPENAI_BASE_URL, OpenAiChat};
pub use whisper::MicrophoneRecognizer;

use crate::Result;
use crate::conversation::Message;

/// Chat completion backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a conversation, returning the assistant's text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or yields no content
    async fn complete(&self, messages: &[Message], model: &str) -> Result<String>;
}

/// Speech synthesis backend
#[async_trait]
pub trait VoiceOutput: Send + Sync {
    /// Speak `text` aloud with the given voice, returning once playback ends
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str, voice_id: &str) -> Result<()>;
}

/// Why a single listen attempt produced no text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenError {
    /// Nothing was heard before the timeout elapsed
    #[error("no speech before timeout")]
    TimedOut,

    /// Speech was captured but could not be transcribed into words
    #[error("speech not recognized")]
    Unrecognized,

    /// The recognition service or audio device failed
    #[error("recognition request failed: {0}")]
    RequestFailed(String),
}

/// Speech-to-text backend
///
/// Shared across the session; each capture run opens one [`SpeechSource`]
/// on the capture thread and keeps it for every listen attempt.
pub trait SpeechRecognizer: Send + Sync {
    /// Open the audio source for one capture run
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    fn open(&self) -> Result<Box<dyn SpeechSource + '_>>;
}

/// Open audio source producing transcripts
///
/// Blocking and bound to the thread that opened it, never used from async
/// code. Audio arriving between attempts is kept for the next one.
pub trait SpeechSource {
    /// Wait up to `timeout` for speech to start, record at most
    /// `phrase_limit` of it and return the transcript
    ///
    /// # Errors
    ///
    /// Returns a [`ListenError`] describing why no text was produced
    fn listen_once(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> std::result::Result<String, ListenError>;
}
