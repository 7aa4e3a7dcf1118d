//! Azure neural text-to-speech

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::VoiceOutput;
use crate::voice::AudioPlayback;
use crate::{Error, Result};

/// Output format requested from the synthesis endpoint (matches playback rate)
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Speaks through Azure Speech Services and the default output device
pub struct AzureSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    region: String,
}

impl AzureSpeech {
    /// Create a new synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the key or region is empty
    pub fn new(api_key: SecretString, region: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::MissingCredential("AZURE_SPEECH_KEY"));
        }
        if region.trim().is_empty() {
            return Err(Error::MissingCredential("AZURE_SERVICE_REGION"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            region: region.trim().to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        )
    }

    /// Synthesize `text` to MP3 bytes
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose_secret())
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", "chatty-copilot")
            .body(build_ssml(text, voice_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Azure TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl VoiceOutput for AzureSpeech {
    async fn speak(&self, text: &str, voice_id: &str) -> Result<()> {
        tracing::debug!(voice = voice_id, chars = text.len(), "synthesizing speech");
        let audio = self.synthesize(text, voice_id).await?;

        // cpal streams are not Send; open and drive the device on a blocking worker
        tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&audio))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))??;

        tracing::info!(voice = voice_id, "response spoken");
        Ok(())
    }
}

/// Voice output used when no synthesis credentials are configured
///
/// Every call fails, so the session prints replies instead of speaking them.
#[derive(Debug, Default, Clone, Copy)]
pub struct MutedVoice;

#[async_trait]
impl VoiceOutput for MutedVoice {
    async fn speak(&self, _text: &str, _voice_id: &str) -> Result<()> {
        Err(Error::Tts("speech synthesis is not configured".to_string()))
    }
}

/// Wrap text in a minimal SSML document for the given voice
fn build_ssml(text: &str, voice_id: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='en-US'><voice name='{}'>{}</voice></speak>",
        escape_xml(voice_id),
        escape_xml(text)
    )
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
