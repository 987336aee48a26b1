//! Voice Chat: talk to a ChatBuddy backend from the terminal.
//!
//! Type a line to send it. Commands:
//! - `/listen` start recording, `/stop` stop and send what was heard
//! - `/new <title>`, `/sessions`, `/load <id>`, `/delete <id>`
//! - `/quiet` stop the reply being spoken, `/quit`
//!
//! STT uses the OpenAI-compatible transcription API when `STT_API_KEY` (or `OPENAI_API_KEY`)
//! is set, else a placeholder. Replies are spoken through ElevenLabs when
//! `ELEVENLABS_API_KEY` is set and voice output is enabled in `settings.toml`.

use chatbuddy_core::{ClientConfig, HttpTransport, VoiceSettings};
use chatbuddy_voice::{
    ElevenLabsTts, MicrophoneConfig, MicrophoneTranscriber, PlaceholderStt, PlaceholderTts,
    SttBackend, TtsBackend, TurnConfig, TurnEvent, TurnOrchestrator, TurnOutcome, VoiceOutput,
    WhisperApiStt,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client = ClientConfig::load()?;
    let settings = VoiceSettings::load()?.with_env_overrides();
    let transport = Arc::new(HttpTransport::new(&client)?);
    match transport.check_health().await {
        Ok(true) => info!("Backend healthy at {}", client.api_base_url),
        Ok(false) => warn!("Backend at {} reports unhealthy", client.api_base_url),
        Err(e) => warn!("Backend health check failed: {}", e),
    }

    let stt: Arc<dyn SttBackend> = match WhisperApiStt::from_env() {
        Ok(s) => {
            info!("STT: transcription API ({})", s.model);
            Arc::new(s)
        }
        Err(e) => {
            info!("STT fallback to Placeholder: {}", e);
            Arc::new(PlaceholderStt::new())
        }
    };
    let tts: Arc<dyn TtsBackend> = match (settings.api_key(), ElevenLabsTts::from_settings(&settings)) {
        (Some(_), Ok(t)) => {
            info!("TTS: ElevenLabs voice {}", settings.voice_id);
            Arc::new(t)
        }
        _ => {
            info!("TTS: Placeholder (set ELEVENLABS_API_KEY to hear replies)");
            Arc::new(PlaceholderTts)
        }
    };

    let orchestrator = TurnOrchestrator::new(
        transport,
        Arc::new(MicrophoneTranscriber::new(MicrophoneConfig::default(), stt)?),
        Arc::new(VoiceOutput::new(tts)?),
        Default::default(),
    );
    let config = TurnConfig {
        auto_send_transcript: true,
        ..TurnConfig::from_settings(&settings, &client)
    };

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                TurnEvent::Phase(phase) => info!("[{}]", phase),
                TurnEvent::Draft(text) if !text.is_empty() => info!("… {}", text),
                TurnEvent::Draft(_) => {}
                TurnEvent::Error(err) => warn!("{}", err),
            }
        }
    });

    info!("Type a message, or /listen to speak. /quit to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let result = match command {
            "/quit" => break,
            "/listen" => orchestrator.begin_recording(&config).await,
            "/stop" => {
                orchestrator.end_recording().await;
                Ok(())
            }
            "/quiet" => {
                orchestrator.stop_playback().await;
                Ok(())
            }
            "/new" => orchestrator
                .start_session(if arg.is_empty() { "New Conversation" } else { arg })
                .await
                .map(|s| info!("Session {} ({})", s.id, s.title)),
            "/sessions" => orchestrator.list_sessions().await.map(|sessions| {
                for s in sessions {
                    println!("{}  {}  {}", s.started_at.format("%Y-%m-%d %H:%M"), s.id, s.title);
                }
            }),
            "/load" => orchestrator.load_session(arg).await.map(|_| {
                for m in orchestrator.messages() {
                    println!("{:>9}: {}", m.sender.as_str(), m.content);
                }
            }),
            "/delete" => orchestrator.delete_session(arg).await,
            _ => orchestrator.submit_text(line, &config).await.map(|outcome| {
                if let TurnOutcome::Replied(reply) = outcome {
                    println!("assistant: {}", reply.content);
                }
            }),
        };
        if let Err(e) = result {
            warn!("{}", e);
        }
    }

    orchestrator.cancel_turn().await;
    Ok(())
}
