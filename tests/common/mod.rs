//! Shared test fakes for the session collaborators

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatty_copilot::{
    Error, LanguageModel, ListenError, Message, PersonaId, PersonaSelector, Result,
    SpeechRecognizer, SpeechSource, VoiceOutput,
};

/// Language model that pops scripted replies and records every request
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::with(replies.iter().map(|r| Ok((*r).to_string())).collect())
    }

    pub fn with(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        })
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[Message], _model: &str) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Llm("no scripted reply left".to_string())))
    }
}

/// Voice output that records what it was asked to say
#[derive(Default)]
pub struct RecordingVoice {
    spoken: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingVoice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::default(),
            fail: true,
        })
    }

    pub fn spoken(&self) -> Vec<(String, String)> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceOutput for RecordingVoice {
    async fn speak(&self, text: &str, voice_id: &str) -> Result<()> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), voice_id.to_string()));
        if self.fail {
            return Err(Error::Tts("synthesis unavailable".to_string()));
        }
        Ok(())
    }
}

/// Recognizer that hears scripted phrases, then nothing
///
/// With `endless`, it keeps producing numbered phrases until stopped.
pub struct ScriptedRecognizer {
    phrases: Mutex<VecDeque<String>>,
    delivered: Mutex<Vec<String>>,
    opens: AtomicUsize,
    delay: Duration,
    endless: bool,
}

impl ScriptedRecognizer {
    pub fn hearing(phrases: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            phrases: Mutex::new(phrases.iter().map(|p| (*p).to_string()).collect()),
            delivered: Mutex::default(),
            opens: AtomicUsize::new(0),
            delay: Duration::from_millis(5),
            endless: false,
        })
    }

    pub fn silent() -> Arc<Self> {
        Self::hearing(&[])
    }

    pub fn endless(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            phrases: Mutex::default(),
            delivered: Mutex::default(),
            opens: AtomicUsize::new(0),
            delay,
            endless: true,
        })
    }

    /// Phrases handed to the capture loop so far
    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    /// How many times a source was opened
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn open(&self) -> Result<Box<dyn SpeechSource + '_>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSource { recognizer: self }))
    }
}

pub struct ScriptedSource<'a> {
    recognizer: &'a ScriptedRecognizer,
}

impl SpeechSource for ScriptedSource<'_> {
    fn listen_once(
        &mut self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> std::result::Result<String, ListenError> {
        let recognizer = self.recognizer;
        std::thread::sleep(recognizer.delay);

        let mut delivered = recognizer.delivered.lock().unwrap();
        let next = if recognizer.endless {
            Some(format!("phrase {}", delivered.len()))
        } else {
            recognizer.phrases.lock().unwrap().pop_front()
        };

        match next {
            Some(text) => {
                delivered.push(text.clone());
                Ok(text)
            }
            None => {
                drop(delivered);
                std::thread::sleep(Duration::from_millis(20));
                Err(ListenError::TimedOut)
            }
        }
    }
}

/// Selector that counts how often it was asked
pub struct CountingSelector {
    choice: PersonaId,
    calls: Arc<AtomicUsize>,
}

impl CountingSelector {
    pub fn new(choice: PersonaId) -> (Box<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = Box::new(Self {
            choice,
            calls: Arc::clone(&calls),
        });
        (selector, calls)
    }
}

impl PersonaSelector for CountingSelector {
    fn select(&self) -> Result<PersonaId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.choice)
    }
}
