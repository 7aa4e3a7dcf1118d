//! Chatty Copilot - push-to-talk voice co-pilot
//!
//! This library provides the pieces of a voice conversation with an LLM:
//! - Persona registry (system prompt + voice per persona)
//! - Rolling conversation store with summary-based compaction
//! - Chat responder composing requests from the trailing window
//! - Session controller driving capture, chat and speech from key events
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │        Keyboard (space / esc)  →  SessionEvent        │
//! └────────────────────────┬─────────────────────────────┘
//!                          │
//! ┌────────────────────────▼─────────────────────────────┐
//! │                 Session Controller                    │
//! │  capture thread  │  Chat Responder  │  voice output   │
//! └────────┬─────────────────┬──────────────────┬────────┘
//!          │                 │                  │
//! ┌────────▼───────┐ ┌───────▼────────┐ ┌───────▼────────┐
//! │ Whisper (STT)  │ │ Chat + Compact │ │  Azure (TTS)   │
//! └────────────────┘ └────────────────┘ └────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod input;
pub mod persona;
pub mod providers;
pub mod session;
pub mod voice;

pub use chat::{ChatFailure, ChatReply, ChatResponder};
pub use config::Config;
pub use conversation::{
    CompactionConfig, CompactionOutcome, Conversation, HistoryCompactor, Message, Role,
};
pub use error::{Error, Result};
pub use persona::{Persona, PersonaId};
pub use providers::{LanguageModel, ListenError, SpeechRecognizer, SpeechSource, VoiceOutput};
pub use session::{
    CaptureState, FixedPersona, ListenSettings, PersonaSelector, Session, SessionController,
    SessionEvent, TurnOutcome,
};
