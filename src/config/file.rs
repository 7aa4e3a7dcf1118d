//! TOML configuration file loading
//!
//! Supports `~/.config/chatty-copilot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults
//! and environment variables take precedence over it.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CopilotConfigFile {
    /// Persona identifier (e.g. "professional")
    #[serde(default)]
    pub persona: Option<String>,

    /// Chat model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Conversation history configuration
    #[serde(default)]
    pub history: HistoryFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Chat model configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// API base URL override
    pub base_url: Option<String>,
}

/// Speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Azure Speech region (e.g. "eastus")
    pub region: Option<String>,

    /// Seconds to wait for speech to start
    pub listen_timeout_secs: Option<u64>,

    /// Maximum seconds recorded per phrase
    pub phrase_limit_secs: Option<u64>,
}

/// Conversation history configuration
#[derive(Debug, Default, Deserialize)]
pub struct HistoryFileConfig {
    /// Message count that triggers compaction
    pub threshold: Option<usize>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub azure_speech: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CopilotConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CopilotConfigFile {
    let Some(path) = config_file_path() else {
        return CopilotConfigFile::default();
    };

    if !path.exists() {
        return CopilotConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CopilotConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CopilotConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/chatty-copilot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("chatty-copilot").join("config.toml"))
}
