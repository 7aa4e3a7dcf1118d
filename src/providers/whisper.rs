//! Microphone speech recognition via `OpenAI` Whisper

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};

use super::{ListenError, SpeechRecognizer, SpeechSource};
use crate::voice::{AudioCapture, SAMPLE_RATE, UtteranceDetector, UtteranceState, samples_for};
use crate::{Error, Result};

/// Ambient noise sample length taken when the microphone opens
const CALIBRATION: Duration = Duration::from_secs(1);

/// Interval between buffer polls while listening
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Detector chunk size, 100ms at the capture rate
const CHUNK_SAMPLES: usize = 1600;

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes phrases from the default microphone
///
/// The HTTP client is built on first use so it is never created inside
/// the async runtime.
pub struct MicrophoneRecognizer {
    client: OnceLock<reqwest::blocking::Client>,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl MicrophoneRecognizer {
    /// Create a new recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, base_url: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::MissingCredential("OPENAI_API_KEY"));
        }

        Ok(Self {
            client: OnceLock::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Transcribe WAV audio
    fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .get_or_init(reqwest::blocking::Client::new)
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json()?;
        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

impl SpeechRecognizer for MicrophoneRecognizer {
    fn open(&self) -> Result<Box<dyn SpeechSource + '_>> {
        let capture = AudioCapture::start()?;

        std::thread::sleep(CALIBRATION);
        let mut detector = UtteranceDetector::new(0);
        let threshold = detector.calibrate(&capture.take_buffer());

        Ok(Box::new(MicrophoneSource {
            recognizer: self,
            capture,
            threshold,
            backlog: Vec::new(),
        }))
    }
}

/// Microphone kept open across listen attempts
struct MicrophoneSource<'a> {
    recognizer: &'a MicrophoneRecognizer,
    capture: AudioCapture,
    threshold: f32,
    /// Audio captured after the last phrase ended
    backlog: Vec<f32>,
}

impl MicrophoneSource<'_> {
    /// Record one phrase; `None` if no speech started before `timeout`
    fn record(&mut self, timeout: Duration, phrase_limit: Duration) -> Option<Vec<f32>> {
        let mut detector = UtteranceDetector::new(samples_for(phrase_limit.as_secs_f32()));
        detector.set_threshold(self.threshold);

        let started = Instant::now();
        let mut speech_started: Option<Instant> = None;

        loop {
            let mut audio = std::mem::take(&mut self.backlog);
            audio.extend(self.capture.take_buffer());

            let complete = audio
                .chunks(CHUNK_SAMPLES)
                .position(|piece| detector.process(piece) == UtteranceState::Complete);
            if let Some(index) = complete {
                let consumed = ((index + 1) * CHUNK_SAMPLES).min(audio.len());
                self.backlog = audio.split_off(consumed);
                return Some(detector.take_utterance());
            }

            match detector.state() {
                UtteranceState::Speaking => {
                    let began = *speech_started.get_or_insert_with(Instant::now);
                    // Device delivering fewer samples than expected must not stall us
                    if began.elapsed() >= phrase_limit {
                        return Some(detector.take_partial());
                    }
                }
                UtteranceState::Waiting => {
                    speech_started = None;
                    if started.elapsed() >= timeout {
                        return None;
                    }
                }
                UtteranceState::Complete => return Some(detector.take_utterance()),
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl SpeechSource for MicrophoneSource<'_> {
    fn listen_once(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> std::result::Result<String, ListenError> {
        let samples = self
            .record(timeout, phrase_limit)
            .ok_or(ListenError::TimedOut)?;

        if samples.is_empty() {
            return Err(ListenError::Unrecognized);
        }

        let wav = crate::voice::samples_to_wav(&samples, SAMPLE_RATE)
            .map_err(|e| ListenError::RequestFailed(e.to_string()))?;
        let text = self
            .recognizer
            .transcribe(wav)
            .map_err(|e| ListenError::RequestFailed(e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ListenError::Unrecognized);
        }
        Ok(text.to_string())
    }
}
