//! Co-pilot personas
//!
//! A persona fixes two things for the whole session: the system-prompt
//! fragment that shapes the model's replies and the neural voice used to
//! speak them. The set is static and defined at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Voice used when a persona has no explicit mapping
pub const DEFAULT_VOICE: &str = "en-US-Andrew2:DragonHDLatestNeural";

/// Task framing appended to every persona fragment
const TASK_FRAMING: &str = "You will be speaking with the flight captain who may ask you \
questions about flying the plane as well as general discussion. You should be chatty in your \
responses, but they must be no longer than 3 sentences. Please make sure that you answer \
technically, as you are a copilot after all, and depending on our mission, between 2 and 300 \
souls are counting on accurate information.";

/// Persona identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaId {
    Professional,
    Friendly,
    Sarcastic,
    Annoyed,
    Nervous,
}

impl PersonaId {
    /// Lowercase identifier as typed by the user
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Sarcastic => "sarcastic",
            Self::Annoyed => "annoyed",
            Self::Nervous => "nervous",
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        PERSONAS
            .iter()
            .map(|p| p.id)
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| Error::PersonaNotFound(s.trim().to_string()))
    }
}

/// A behavioral and voice profile for the co-pilot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// Identifier
    pub id: PersonaId,
    /// Personality fragment placed at the head of the system prompt
    pub system_prompt: &'static str,
    /// Neural voice identifier, `None` to use [`DEFAULT_VOICE`]
    pub voice_id: Option<&'static str>,
}

impl Persona {
    /// Voice to speak with, falling back to [`DEFAULT_VOICE`]
    #[must_use]
    pub fn voice(&self) -> &'static str {
        self.voice_id.unwrap_or(DEFAULT_VOICE)
    }

    /// Full system prompt: personality fragment followed by the task framing
    #[must_use]
    pub fn compose_system_prompt(&self) -> String {
        format!("{} {TASK_FRAMING}", self.system_prompt)
    }
}

static PERSONAS: [Persona; 5] = [
    Persona {
        id: PersonaId::Professional,
        system_prompt: "You are a highly experienced co-pilot with an analytical and \
            professional demeanor.  You're polite, but you keep your answers short, technical \
            and to the point.",
        voice_id: Some("en-US-SerenaMultilingualNeural"),
    },
    Persona {
        id: PersonaId::Friendly,
        system_prompt: "You are a friendly and enthusiastic co-pilot with a passion for \
            aviation.  You enjoy talking with the pilot and often make small talk, but of course \
            within reason.",
        voice_id: Some("en-US-Andrew2:DragonHDLatestNeural"),
    },
    Persona {
        id: PersonaId::Sarcastic,
        system_prompt: "You are a sarcastic and witty co-pilot who loves cracking jokes.  You \
            get really annoyed when people don't understand you, your jokes, or things you \
            determine are common sense.",
        voice_id: Some("en-US-SteffanMultilingualNeural"),
    },
    Persona {
        id: PersonaId::Annoyed,
        system_prompt: "You are a sarcastic and annoyed co-pilot who is ready to be done for \
            the day.  You get really annoyed when people don't understand you or things you \
            determine are common sense.  You're not in the mood for jokes or games.",
        voice_id: Some("en-US-SaraNeural"),
    },
    Persona {
        id: PersonaId::Nervous,
        system_prompt: "You are a anxious and nervous passenger sitting in the co-pilot's \
            seat.  You were put up to this flight by your friend, the pilot, and you want to help \
            out but you're slightly uncomfortable and scared.",
        voice_id: Some("en-US-GuyNeural"),
    },
];

/// All personas in declaration order
#[must_use]
pub fn all() -> &'static [Persona] {
    &PERSONAS
}

/// Look up a persona by identifier
///
/// # Errors
///
/// Returns [`Error::PersonaNotFound`] if the registry has no entry for `id`
pub fn get_persona(id: PersonaId) -> Result<&'static Persona> {
    PERSONAS
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| Error::PersonaNotFound(id.to_string()))
}

/// Resolve the voice for a persona
#[must_use]
pub fn resolve_voice(id: PersonaId) -> &'static str {
    get_persona(id).map_or(DEFAULT_VOICE, Persona::voice)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_id_resolves() {
        for persona in all() {
            let found = get_persona(persona.id).unwrap();
            assert_eq!(found.id, persona.id);
        }
        assert_eq!(all().len(), 5);
    }

    #[test]
    fn prompts_and_voices_are_distinct() {
        let prompts: HashSet<_> = all().iter().map(|p| p.system_prompt).collect();
        let voices: HashSet<_> = all().iter().map(Persona::voice).collect();
        assert_eq!(prompts.len(), 5);
        assert_eq!(voices.len(), 5);
    }

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        assert_eq!("  Sarcastic ".parse::<PersonaId>().unwrap(), PersonaId::Sarcastic);
        assert_eq!("NERVOUS".parse::<PersonaId>().unwrap(), PersonaId::Nervous);
    }

    #[test]
    fn parse_unknown_is_not_found() {
        let err = "grumpy".parse::<PersonaId>().unwrap_err();
        assert!(matches!(err, Error::PersonaNotFound(ref id) if id == "grumpy"));
    }

    #[test]
    fn voice_falls_back_to_default() {
        let persona = Persona {
            id: PersonaId::Friendly,
            system_prompt: "test",
            voice_id: None,
        };
        assert_eq!(persona.voice(), DEFAULT_VOICE);
        assert_eq!(resolve_voice(PersonaId::Professional), "en-US-SerenaMultilingualNeural");
    }

    #[test]
    fn system_prompt_carries_fragment_and_framing() {
        let persona = get_persona(PersonaId::Professional).unwrap();
        let prompt = persona.compose_system_prompt();
        assert!(prompt.starts_with(persona.system_prompt));
        assert!(prompt.contains("no longer than 3 sentences"));
        assert!(prompt.contains("flight captain"));
    }
}
