//! Configuration management for the co-pilot

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::chat::DEFAULT_MODEL;
use crate::conversation::MIN_THRESHOLD;
use crate::persona::PersonaId;
use crate::providers::OPENAI_BASE_URL;
use crate::{Error, Result};

use self::file::CopilotConfigFile;

/// Co-pilot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Persona chosen up front; `None` asks interactively on first toggle
    pub persona: Option<PersonaId>,

    /// Chat model identifier
    pub llm_model: String,

    /// Chat/transcription API base URL
    pub openai_base_url: String,

    /// Message count that triggers compaction; also the request window size
    pub history_threshold: usize,

    /// Speech capture configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Speech capture and synthesis configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Azure Speech region
    pub region: Option<String>,

    /// How long one listen attempt waits for speech to start
    pub listen_timeout: Duration,

    /// Longest phrase recorded in one listen attempt
    pub phrase_limit: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            region: None,
            listen_timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(10),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat and Whisper); required
    pub openai: SecretString,

    /// Azure Speech key (optional TTS)
    pub azure_speech: Option<SecretString>,
}

impl Config {
    /// Load configuration from the environment and the optional config file
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] if no `OpenAI` key is available,
    /// or [`Error::Config`] if a value is malformed
    pub fn load() -> Result<Self> {
        let file = file::load_config_file();
        Self::from_sources(&file, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// Environment values win over file values.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`]
    pub fn from_sources(
        file: &CopilotConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let openai = env("OPENAI_API_KEY")
            .or_else(|| file.api_keys.openai.clone())
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::MissingCredential("OPENAI_API_KEY"))?;

        let azure_speech = env("AZURE_SPEECH_KEY")
            .or_else(|| file.api_keys.azure_speech.clone())
            .map(SecretString::from);

        let persona = env("COPILOT_PERSONA")
            .or_else(|| file.persona.clone())
            .map(|p| p.parse::<PersonaId>())
            .transpose()?;

        let llm_model = env("COPILOT_MODEL")
            .or_else(|| file.llm.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let openai_base_url = env("OPENAI_BASE_URL")
            .or_else(|| file.llm.base_url.clone())
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        let history_threshold = match env("COPILOT_HISTORY_THRESHOLD") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                Error::Config(format!("COPILOT_HISTORY_THRESHOLD must be a number, got {raw:?}"))
            })?,
            None => file.history.threshold.unwrap_or(20),
        };

        if history_threshold < MIN_THRESHOLD {
            return Err(Error::Config(format!(
                "history threshold must be at least {MIN_THRESHOLD}, got {history_threshold}"
            )));
        }

        let defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            stt_model: env("COPILOT_STT_MODEL")
                .or_else(|| file.voice.stt_model.clone())
                .unwrap_or(defaults.stt_model),
            region: env("AZURE_SERVICE_REGION").or_else(|| file.voice.region.clone()),
            listen_timeout: file
                .voice
                .listen_timeout_secs
                .map_or(defaults.listen_timeout, Duration::from_secs),
            phrase_limit: file
                .voice
                .phrase_limit_secs
                .map_or(defaults.phrase_limit, Duration::from_secs),
        };

        Ok(Self {
            persona,
            llm_model,
            openai_base_url,
            history_threshold,
            voice,
            api_keys: ApiKeys {
                openai: SecretString::from(openai),
                azure_speech,
            },
        })
    }
}
