//! Utterance segmentation
//!
//! Splits a live sample stream into a single spoken phrase using a simple
//! energy gate: speech starts when a chunk is louder than the threshold and
//! ends after a run of quiet samples or when the phrase limit is reached.

use super::capture::SAMPLE_RATE;

/// Floor for the speech energy threshold
const MIN_ENERGY_THRESHOLD: f32 = 0.01;

/// Ambient RMS is scaled by this factor to get the speech threshold
const AMBIENT_FACTOR: f32 = 3.0;

/// Minimum duration of speech to keep (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration that ends an utterance (in samples)
const SILENCE_SAMPLES: usize = 12800; // 0.8 seconds

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    /// Waiting for speech to start
    Waiting,
    /// Speech in progress, accumulating
    Speaking,
    /// Phrase finished; take it with [`UtteranceDetector::take_utterance`]
    Complete,
}

/// Detects a single spoken phrase in a stream of samples
#[derive(Debug)]
pub struct UtteranceDetector {
    threshold: f32,
    phrase_limit: usize,
    state: UtteranceState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl UtteranceDetector {
    /// Create a detector that cuts phrases at `phrase_limit_samples`
    #[must_use]
    pub const fn new(phrase_limit_samples: usize) -> Self {
        Self {
            threshold: MIN_ENERGY_THRESHOLD,
            phrase_limit: phrase_limit_samples,
            state: UtteranceState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Raise the speech threshold above the measured background noise
    ///
    /// Returns the threshold now in effect.
    pub fn calibrate(&mut self, ambient: &[f32]) -> f32 {
        self.threshold = (calculate_energy(ambient) * AMBIENT_FACTOR).max(MIN_ENERGY_THRESHOLD);
        tracing::debug!(threshold = self.threshold, "calibrated for ambient noise");
        self.threshold
    }

    /// Set the speech threshold directly
    pub const fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Feed a chunk of samples and return the resulting state
    pub fn process(&mut self, samples: &[f32]) -> UtteranceState {
        let is_speech = calculate_energy(samples) > self.threshold;

        match self.state {
            UtteranceState::Waiting => {
                if is_speech {
                    self.state = UtteranceState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!("speech started");
                }
            }
            UtteranceState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.speech_buffer.len() >= self.phrase_limit {
                    tracing::debug!("phrase limit reached");
                    self.speech_buffer.truncate(self.phrase_limit);
                    self.state = UtteranceState::Complete;
                } else if self.silence_counter > SILENCE_SAMPLES {
                    if self.speech_buffer.len() - self.silence_counter >= MIN_SPEECH_SAMPLES {
                        self.state = UtteranceState::Complete;
                    } else {
                        tracing::trace!("blip too short, waiting again");
                        self.reset();
                    }
                }
            }
            UtteranceState::Complete => {}
        }

        self.state
    }

    /// Take the finished phrase and reset for the next one
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Take whatever was captured so far, complete or not
    pub fn take_partial(&mut self) -> Vec<f32> {
        if self.state == UtteranceState::Waiting {
            return Vec::new();
        }
        self.take_utterance()
    }

    /// Reset to waiting
    pub fn reset(&mut self) {
        self.state = UtteranceState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> UtteranceState {
        self.state
    }

    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Samples in `seconds` of audio at the capture rate
#[must_use]
pub fn samples_for(seconds: f32) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let n = (SAMPLE_RATE as f32 * seconds.max(0.0)) as usize;
    n
}

/// RMS energy of a chunk
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f32, amplitude: f32) -> Vec<f32> {
        (0..samples_for(seconds))
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn silence(seconds: f32) -> Vec<f32> {
        vec![0.0; samples_for(seconds)]
    }

    #[test]
    fn energy_of_silence_is_zero() {
        assert!(calculate_energy(&silence(0.1)) < f32::EPSILON);
        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn calibration_scales_ambient_noise() {
        let mut detector = UtteranceDetector::new(samples_for(10.0));
        assert!((detector.calibrate(&silence(1.0)) - MIN_ENERGY_THRESHOLD).abs() < f32::EPSILON);

        let noisy = tone(1.0, 0.05);
        let threshold = detector.calibrate(&noisy);
        assert!(threshold > 0.05 && threshold < 0.2);
    }

    #[test]
    fn speech_then_silence_completes() {
        let mut detector = UtteranceDetector::new(samples_for(10.0));

        assert_eq!(detector.process(&silence(0.1)), UtteranceState::Waiting);
        assert_eq!(detector.process(&tone(0.5, 0.3)), UtteranceState::Speaking);
        assert_eq!(detector.process(&silence(1.0)), UtteranceState::Complete);

        let phrase = detector.take_utterance();
        assert!(phrase.len() >= samples_for(0.5));
        assert_eq!(detector.state(), UtteranceState::Waiting);
    }

    #[test]
    fn short_blip_is_discarded() {
        let mut detector = UtteranceDetector::new(samples_for(10.0));

        detector.process(&tone(0.1, 0.3));
        assert_eq!(detector.process(&silence(1.0)), UtteranceState::Waiting);
        assert!(detector.take_partial().is_empty());
    }

    #[test]
    fn phrase_limit_cuts_long_speech() {
        let limit = samples_for(1.0);
        let mut detector = UtteranceDetector::new(limit);

        detector.process(&tone(0.6, 0.3));
        assert_eq!(detector.process(&tone(0.6, 0.3)), UtteranceState::Complete);
        assert_eq!(detector.take_utterance().len(), limit);
    }
}
