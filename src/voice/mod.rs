//! Local audio I/O
//!
//! Microphone capture, utterance segmentation and speaker playback.
//! Transcription and synthesis happen in `providers`.

mod capture;
mod playback;
mod utterance;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use utterance::{UtteranceDetector, UtteranceState, samples_for};
