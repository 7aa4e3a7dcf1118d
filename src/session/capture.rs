//! Background capture activity
//!
//! Opens the speech source once on a dedicated thread and runs blocking
//! listen attempts against it until cancelled. Cancellation is cooperative:
//! the token is checked between attempts, so stopping takes at most one
//! attempt (listen timeout + phrase limit + one transcription request) to
//! be observed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::input::announce;
use crate::providers::{ListenError, SpeechRecognizer, SpeechSource};
use crate::{Error, Result};

/// Pause after a failure so a missing device doesn't spin the thread
const FAILURE_BACKOFF: Duration = Duration::from_millis(500);

/// Timing for a single listen attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSettings {
    /// How long to wait for speech to start
    pub timeout: Duration,
    /// Longest phrase recorded per attempt
    pub phrase_limit: Duration,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(10),
        }
    }
}

/// Handle to a running capture thread
pub(crate) struct CaptureTask {
    cancel: CancellationToken,
    finished: oneshot::Receiver<()>,
}

impl CaptureTask {
    /// Start capturing, appending each recognized phrase to `fragments`
    pub(crate) fn spawn(
        recognizer: Arc<dyn SpeechRecognizer>,
        fragments: Arc<Mutex<Vec<String>>>,
        settings: ListenSettings,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let (done_tx, finished) = oneshot::channel();
        let token = cancel.clone();

        std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                capture_loop(recognizer.as_ref(), &fragments, settings, &token);
                let _ = done_tx.send(());
            })
            .map_err(|e| Error::Audio(format!("failed to start capture thread: {e}")))?;

        Ok(Self { cancel, finished })
    }

    /// Signal the thread to stop and wait until it has exited
    ///
    /// Once this returns, every phrase captured before the stop is in the
    /// fragment buffer and nothing else will be appended.
    pub(crate) async fn stop(mut self) {
        self.cancel.cancel();
        // A dropped sender (panicked thread) also means the loop is gone
        let _ = (&mut self.finished).await;
        tracing::debug!("capture thread stopped");
    }
}

impl Drop for CaptureTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn capture_loop(
    recognizer: &dyn SpeechRecognizer,
    fragments: &Mutex<Vec<String>>,
    settings: ListenSettings,
    cancel: &CancellationToken,
) {
    tracing::debug!("capture thread started");

    while !cancel.is_cancelled() {
        match recognizer.open() {
            Ok(mut source) => {
                listen_until_cancelled(source.as_mut(), fragments, settings, cancel);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to open speech source");
                announce(format_args!("Speech recognition error: {e}"));
                std::thread::sleep(FAILURE_BACKOFF);
            }
        }
    }
}

fn listen_until_cancelled(
    source: &mut (dyn SpeechSource + '_),
    fragments: &Mutex<Vec<String>>,
    settings: ListenSettings,
    cancel: &CancellationToken,
) {
    while !cancel.is_cancelled() {
        match source.listen_once(settings.timeout, settings.phrase_limit) {
            Ok(text) => {
                announce(format_args!("You said: {text}"));
                match fragments.lock() {
                    Ok(mut buf) => buf.push(text),
                    Err(e) => tracing::error!(error = %e, "fragment buffer poisoned"),
                }
            }
            Err(ListenError::TimedOut) => {
                tracing::debug!("listen attempt timed out");
                announce("I didn't hear anything. Please try again.");
            }
            Err(ListenError::Unrecognized) => {
                tracing::debug!("speech not recognized");
                announce("Sorry, I couldn't understand what you said. Please try again.");
            }
            Err(ListenError::RequestFailed(reason)) => {
                tracing::warn!(error = %reason, "speech recognition failed");
                announce(format_args!("Speech recognition error: {reason}"));
                std::thread::sleep(FAILURE_BACKOFF);
            }
        }
    }
}
