//! Terminal input and console output
//!
//! The keyboard is an event source: a reader thread turns key presses into
//! [`SessionEvent`]s (space toggles, escape terminates). The persona prompt
//! borrows the terminal while it runs, so the reader pauses for it.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use dialoguer::Select;
use tokio::sync::mpsc;

use crate::persona::{self, PersonaId};
use crate::session::{PersonaSelector, SessionEvent};
use crate::{Error, Result};

/// How long the reader waits for a key before re-checking its flags
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Print a user-facing line
///
/// Uses `\r\n` so lines stay aligned while the terminal is in raw mode.
pub fn announce(message: impl Display) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{message}\r\n");
    let _ = stdout.flush();
}

/// Writer that ends lines with `\r\n`
///
/// Log lines go through this so they stay aligned while raw mode is on.
#[derive(Debug)]
pub struct CrlfWriter<W> {
    inner: W,
}

impl<W: Write> CrlfWriter<W> {
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for line in buf.split_inclusive(|b| *b == b'\n') {
            match line.strip_suffix(b"\n") {
                Some(body) => {
                    self.inner.write_all(body.strip_suffix(b"\r").unwrap_or(body))?;
                    self.inner.write_all(b"\r\n")?;
                }
                None => self.inner.write_all(line)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Map a key press to a session event
#[must_use]
pub fn map_key(key: &KeyEvent) -> Option<SessionEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char(' ') => Some(SessionEvent::Toggle),
        KeyCode::Esc => Some(SessionEvent::Terminate),
        // Raw mode swallows SIGINT
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(SessionEvent::Terminate)
        }
        _ => None,
    }
}

/// Raw-mode keyboard reader feeding session events
pub struct TerminalInput {
    suspended: Arc<AtomicBool>,
}

impl TerminalInput {
    /// Enable raw mode and start the reader thread
    ///
    /// The thread exits after sending [`SessionEvent::Terminate`] or once
    /// the receiving side is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the terminal cannot enter raw mode or the thread
    /// cannot be spawned
    pub fn spawn(events: mpsc::Sender<SessionEvent>) -> Result<Self> {
        terminal::enable_raw_mode().map_err(|e| Error::Input(e.to_string()))?;

        let suspended = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&suspended);

        std::thread::Builder::new()
            .name("keyboard".to_string())
            .spawn(move || read_keys(&events, &flag))
            .map_err(|e| Error::Input(format!("failed to start keyboard thread: {e}")))?;

        Ok(Self { suspended })
    }

    /// Interactive persona prompt sharing this terminal
    #[must_use]
    pub fn persona_selector(&self) -> TerminalPersonaSelector {
        TerminalPersonaSelector {
            suspended: Some(Arc::clone(&self.suspended)),
        }
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn read_keys(events: &mpsc::Sender<SessionEvent>, suspended: &AtomicBool) {
    while !events.is_closed() {
        if suspended.load(Ordering::Acquire) {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }

        match event::poll(POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::error!(error = %e, "keyboard poll failed");
                break;
            }
        }

        // Leave the key for the prompt if it took over while we waited
        if suspended.load(Ordering::Acquire) {
            continue;
        }

        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(error = %e, "keyboard read failed");
                break;
            }
        };

        let Some(session_event) = map_key(&key) else {
            continue;
        };

        tracing::trace!(?session_event, "key event");
        if events.blocking_send(session_event).is_err() || session_event == SessionEvent::Terminate
        {
            break;
        }
    }

    tracing::debug!("keyboard reader stopped");
}

/// Persona prompt on the terminal
pub struct TerminalPersonaSelector {
    suspended: Option<Arc<AtomicBool>>,
}

impl TerminalPersonaSelector {
    /// Prompt without a running keyboard reader
    #[must_use]
    pub const fn standalone() -> Self {
        Self { suspended: None }
    }
}

/// Restores raw mode and resumes the reader when the prompt ends
struct PromptGuard<'a> {
    suspended: Option<&'a AtomicBool>,
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.suspended {
            let _ = terminal::enable_raw_mode();
            flag.store(false, Ordering::Release);
        }
    }
}

impl PersonaSelector for TerminalPersonaSelector {
    fn select(&self) -> Result<PersonaId> {
        let flag = self.suspended.as_deref();
        if let Some(flag) = flag {
            flag.store(true, Ordering::Release);
            let _ = terminal::disable_raw_mode();
        }
        let _guard = PromptGuard { suspended: flag };

        let labels: Vec<&str> = persona::all().iter().map(|p| p.id.as_str()).collect();
        println!("Available personalities: {}.", labels.join(", "));

        let index = Select::new()
            .with_prompt("Please select a personality type and press 'Enter' to continue")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| Error::Input(e.to_string()))?;

        persona::all()
            .get(index)
            .map(|p| p.id)
            .ok_or_else(|| Error::PersonaNotFound(index.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn space_toggles_and_escape_terminates() {
        assert_eq!(
            map_key(&press(KeyCode::Char(' '), KeyModifiers::NONE)),
            Some(SessionEvent::Toggle)
        );
        assert_eq!(
            map_key(&press(KeyCode::Esc, KeyModifiers::NONE)),
            Some(SessionEvent::Terminate)
        );
        assert_eq!(
            map_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(SessionEvent::Terminate)
        );
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(map_key(&press(KeyCode::Char('a'), KeyModifiers::NONE)), None);
        assert_eq!(map_key(&press(KeyCode::Enter, KeyModifiers::NONE)), None);
    }

    #[test]
    fn crlf_writer_terminates_lines_for_raw_mode() {
        let mut writer = CrlfWriter::new(Vec::new());
        write!(writer, "first\nsecond\r\nthird").unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.inner, b"first\r\nsecond\r\nthird");
    }

    #[test]
    fn key_release_is_ignored() {
        let mut key = press(KeyCode::Char(' '), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(&key), None);
    }
}
