use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use chatty_copilot::input::{CrlfWriter, TerminalInput, TerminalPersonaSelector};
use chatty_copilot::persona::{self, PersonaId};
use chatty_copilot::providers::{
    AzureSpeech, MicrophoneRecognizer, MutedVoice, OpenAiChat, SpeechRecognizer,
    VoiceOutput,
};
use chatty_copilot::voice::{AudioPlayback, PLAYBACK_SAMPLE_RATE};
use chatty_copilot::{
    ChatResponder, CompactionConfig, Config, HistoryCompactor, ListenSettings, PersonaSelector,
    Session, SessionController,
};

/// Chatty Copilot - talk to your co-pilot with push-to-talk
#[derive(Parser)]
#[command(name = "copilot", version, about)]
struct Cli {
    /// Persona to use (professional, friendly, sarcastic, annoyed, nervous);
    /// asked interactively on first toggle when omitted
    #[arg(short, long)]
    persona: Option<PersonaId>,

    /// Chat model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// List personas and their voices
    Personas,
    /// Listen for one phrase and print the transcript
    TestMic,
    /// Play a test tone
    TestSpeaker,
    /// Speak text with a persona's voice (asks for one if none is configured)
    TestTts {
        /// Text to speak
        #[arg(default_value = "Good morning captain, all systems are go.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,chatty_copilot=info",
        1 => "info,chatty_copilot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(|| CrlfWriter::new(std::io::stderr()))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Some(Command::Personas)) {
        list_personas();
        return Ok(());
    }

    let mut config = Config::load()?;
    if cli.persona.is_some() {
        config.persona = cli.persona;
    }
    if let Some(model) = cli.model {
        config.llm_model = model;
    }

    match cli.command {
        Some(Command::TestMic) => test_mic(&config).await,
        Some(Command::TestSpeaker) => test_speaker().await,
        Some(Command::TestTts { text }) => test_tts(&config, &text).await,
        Some(Command::Personas) | None => run_session(config).await,
    }
}

async fn run_session(config: Config) -> anyhow::Result<()> {
    let llm = Arc::new(OpenAiChat::new(
        config.api_keys.openai.clone(),
        Some(config.openai_base_url.clone()),
    )?);
    let compactor = HistoryCompactor::new(
        CompactionConfig {
            threshold: config.history_threshold,
            ..Default::default()
        },
        config.llm_model.clone(),
    );
    let responder = ChatResponder::new(llm, config.llm_model.clone(), compactor);

    tracing::info!(
        model = responder.model(),
        persona = ?config.persona,
        threshold = config.history_threshold,
        "starting chatty copilot"
    );

    let recognizer = build_recognizer(&config)?;
    let voice = build_voice(&config);

    let (tx, rx) = mpsc::channel(16);
    let input = TerminalInput::spawn(tx)?;
    let selector = Box::new(input.persona_selector());

    let controller = SessionController::new(
        Session::new(config.persona)?,
        responder,
        recognizer,
        voice,
        selector,
        ListenSettings {
            timeout: config.voice.listen_timeout,
            phrase_limit: config.voice.phrase_limit,
        },
    );

    let session = controller.run(rx).await;
    drop(input);

    tracing::info!(messages = session.conversation().len(), "goodbye");
    Ok(())
}

fn build_recognizer(config: &Config) -> anyhow::Result<Arc<dyn SpeechRecognizer>> {
    Ok(Arc::new(MicrophoneRecognizer::new(
        config.api_keys.openai.clone(),
        config.openai_base_url.clone(),
        config.voice.stt_model.clone(),
    )?))
}

fn build_voice(config: &Config) -> Arc<dyn VoiceOutput> {
    let (Some(key), Some(region)) = (&config.api_keys.azure_speech, &config.voice.region) else {
        tracing::warn!("AZURE_SPEECH_KEY/AZURE_SERVICE_REGION not set, replies will not be spoken");
        return Arc::new(MutedVoice);
    };

    match AzureSpeech::new(key.clone(), region.clone()) {
        Ok(speech) => Arc::new(speech),
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis disabled");
            Arc::new(MutedVoice)
        }
    }
}

fn list_personas() {
    for p in persona::all() {
        println!("{:<14} {}", p.id, p.voice());
    }
}

async fn test_mic(config: &Config) -> anyhow::Result<()> {
    let recognizer = build_recognizer(config)?;
    let listen = ListenSettings {
        timeout: config.voice.listen_timeout,
        phrase_limit: config.voice.phrase_limit,
    };

    println!("Calibrating for background noise, then say something...");
    let result = tokio::task::spawn_blocking(move || {
        let mut source = recognizer.open()?;
        Ok::<_, chatty_copilot::Error>(source.listen_once(listen.timeout, listen.phrase_limit))
    })
    .await??;

    match result {
        Ok(text) => println!("You said: {text}"),
        Err(e) => println!("No transcript: {e}"),
    }
    Ok(())
}

async fn test_speaker() -> anyhow::Result<()> {
    println!("Playing test tone...");
    tokio::task::spawn_blocking(|| {
        let playback = AudioPlayback::new()?;
        playback.play_samples(tone(440.0, Duration::from_secs(1)))
    })
    .await??;
    println!("Done");
    Ok(())
}

async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let id = match config.persona {
        Some(id) => id,
        None => {
            tokio::task::spawn_blocking(|| TerminalPersonaSelector::standalone().select()).await??
        }
    };
    let voice_id = persona::resolve_voice(id);
    let (Some(key), Some(region)) = (&config.api_keys.azure_speech, &config.voice.region) else {
        anyhow::bail!("AZURE_SPEECH_KEY and AZURE_SERVICE_REGION are required for TTS");
    };

    let speech = AzureSpeech::new(key.clone(), region.clone())?;
    println!("Speaking as {id} ({voice_id})...");
    speech.speak(text, voice_id).await?;
    Ok(())
}

/// Sine tone at the playback rate
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tone(frequency: f32, duration: Duration) -> Vec<f32> {
    let rate = PLAYBACK_SAMPLE_RATE as f32;
    let count = (rate * duration.as_secs_f32()) as usize;
    (0..count)
        .map(|i| 0.2 * (2.0 * std::f32::consts::PI * frequency * i as f32 / rate).sin())
        .collect()
}
