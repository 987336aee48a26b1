//! **Speech Synthesis Player**: text to speech, played through the default output device.
//!
//! `TtsBackend` turns text into encoded audio (ElevenLabs MP3 in production). `VoiceOutput`
//! owns a `rodio` sink on a dedicated audio thread and plays one reply at a time; a new
//! `speak` stops whatever is playing before it starts. Completion of each playback is
//! reported through its own `Playback` handle.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use chatbuddy_core::{VoiceSettings, DEFAULT_VOICE_ID};
use rodio::{OutputStream, Sink, Source};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io/v1";
pub const ELEVENLABS_MODEL_ID: &str = "eleven_monolingual_v1";

/// What to say and with which voice. `None` fields fall back to the backend's own defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: Option<String>,
    pub api_key: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: None,
            api_key: None,
        }
    }
}

#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Encoded audio (MP3/WAV) for the request. Empty means nothing to play.
    async fn synthesize(&self, request: &SpeechRequest) -> VoiceResult<Vec<u8>>;
}

/// Silent TTS: returns no audio, so every playback completes immediately.
#[derive(Debug, Default)]
pub struct PlaceholderTts;

#[async_trait]
impl TtsBackend for PlaceholderTts {
    async fn synthesize(&self, _request: &SpeechRequest) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// ElevenLabs `voice_settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceTuning {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceTuning {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// One entry of the ElevenLabs voice catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceInfo>,
}

#[derive(Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceTuning,
}

/// ElevenLabs text-to-speech.
#[derive(Debug, Clone)]
pub struct ElevenLabsTts {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub api_key: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    pub tuning: VoiceTuning,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(api_key: Option<String>) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: ELEVENLABS_API_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: ELEVENLABS_MODEL_ID.to_string(),
            tuning: VoiceTuning::default(),
            client,
        })
    }

    /// Key and voice from the user's settings.
    pub fn from_settings(settings: &VoiceSettings) -> VoiceResult<Self> {
        Ok(Self::new(settings.api_key().map(str::to_string))?.with_voice(settings.voice_id.clone()))
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The per-request key, else the configured one.
    fn key_for<'a>(&'a self, request_key: Option<&'a str>) -> VoiceResult<&'a str> {
        let usable = |k: &'a str| Some(k.trim()).filter(|k| !k.is_empty());
        request_key
            .and_then(usable)
            .or_else(|| self.api_key.as_deref().and_then(usable))
            .ok_or_else(|| {
                VoiceError::SynthesisUnavailable("ElevenLabs API key not configured".to_string())
            })
    }

    /// Voices available to the configured key.
    pub async fn list_voices(&self) -> VoiceResult<Vec<VoiceInfo>> {
        let key = self.key_for(None)?;
        let res = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", key)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        let voices: VoicesResponse = res.json().await.map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(voices.voices)
    }
}

/// ElevenLabs errors come as `{"detail": "..."}` or `{"detail": {"message": "..."}}`.
fn error_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = json.get("detail")?;
    detail
        .as_str()
        .or_else(|| detail.get("message").and_then(|m| m.as_str()))
        .map(str::to_string)
}

fn api_error(status: reqwest::StatusCode, body: &str) -> VoiceError {
    let detail = error_detail(body).unwrap_or_else(|| "Unknown error".to_string());
    if status == reqwest::StatusCode::UNAUTHORIZED {
        VoiceError::SynthesisUnavailable(format!("ElevenLabs rejected the API key: {}", detail))
    } else {
        VoiceError::Tts(format!("ElevenLabs error {}: {}", status.as_u16(), detail))
    }
}

#[async_trait]
impl TtsBackend for ElevenLabsTts {
    async fn synthesize(&self, request: &SpeechRequest) -> VoiceResult<Vec<u8>> {
        let text = request.text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.key_for(request.api_key.as_deref())?;
        let voice = request.voice_id.as_deref().unwrap_or(&self.voice_id);
        let body = SynthesisBody {
            text,
            model_id: &self.model_id,
            voice_settings: &self.tuning,
        };
        debug!(target: "chatbuddy::voice", voice, chars = text.len(), "synthesizing reply");

        let res = self
            .client
            .post(format!("{}/text-to-speech/{}", self.base_url, voice))
            .header("xi-api-key", key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        let bytes = res.bytes().await.map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// How a playback ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEnd {
    Completed,
    Stopped,
    Failed(String),
}

/// Completion signal of one playback.
#[derive(Debug)]
pub struct Playback {
    done: oneshot::Receiver<PlaybackEnd>,
}

impl Playback {
    /// A playback plus the sender that will report its end.
    pub fn pending() -> (oneshot::Sender<PlaybackEnd>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { done: rx })
    }

    /// A playback that has already ended.
    pub fn ended(end: PlaybackEnd) -> Self {
        let (tx, playback) = Self::pending();
        let _ = tx.send(end);
        playback
    }

    /// Wait for the playback to end. A dropped player counts as stopped.
    pub async fn finished(self) -> PlaybackEnd {
        self.done.await.unwrap_or(PlaybackEnd::Stopped)
    }
}

#[async_trait]
pub trait SpeechPlayer: Send + Sync {
    /// Synthesize and start playing. Any current playback is stopped first.
    async fn speak(&self, request: SpeechRequest) -> VoiceResult<Playback>;

    /// Stop the current playback, if any. Returns once the device is quiet.
    async fn stop(&self);

    fn is_playing(&self) -> bool;
}

enum AudioCommand {
    Play {
        bytes: Vec<u8>,
        done: oneshot::Sender<PlaybackEnd>,
        ack: oneshot::Sender<VoiceResult<()>>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
}

/// rodio-backed player. The output stream is `!Send`, so it lives on the audio thread.
pub struct VoiceOutput {
    tts: Arc<dyn TtsBackend>,
    commands: std_mpsc::Sender<AudioCommand>,
    playing: Arc<AtomicBool>,
}

impl VoiceOutput {
    /// Open the default output device.
    pub fn new(tts: Arc<dyn TtsBackend>) -> VoiceResult<Self> {
        let (commands, rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<VoiceResult<()>>(1);
        let playing = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&playing);

        thread::Builder::new()
            .name("chatbuddy-audio-out".to_string())
            .spawn(move || audio_thread(rx, ready_tx, flag))?;

        ready_rx
            .recv()
            .map_err(|_| VoiceError::Playback("audio thread exited during startup".to_string()))??;
        info!(target: "chatbuddy::voice", "VoiceOutput: sink ready for playback");

        Ok(Self {
            tts,
            commands,
            playing,
        })
    }
}

fn audio_thread(
    commands: std_mpsc::Receiver<AudioCommand>,
    ready: std_mpsc::SyncSender<VoiceResult<()>>,
    playing: Arc<AtomicBool>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(VoiceError::Playback(e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut current: Option<(Sink, oneshot::Sender<PlaybackEnd>)> = None;
    let finish = |current: &mut Option<(Sink, oneshot::Sender<PlaybackEnd>)>, end: PlaybackEnd| {
        if let Some((sink, done)) = current.take() {
            sink.stop();
            let _ = done.send(end);
        }
        playing.store(false, Ordering::SeqCst);
    };

    loop {
        match commands.recv_timeout(Duration::from_millis(50)) {
            Ok(AudioCommand::Play { bytes, done, ack }) => {
                finish(&mut current, PlaybackEnd::Stopped);
                let sink = match Sink::try_new(&handle) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ack.send(Err(VoiceError::Playback(e.to_string())));
                        continue;
                    }
                };
                let source = match rodio::Decoder::new(Cursor::new(bytes)) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ack.send(Err(VoiceError::Playback(format!("Decode failed: {}", e))));
                        continue;
                    }
                };
                sink.append(source.convert_samples::<f32>());
                sink.play();
                playing.store(true, Ordering::SeqCst);
                current = Some((sink, done));
                let _ = ack.send(Ok(()));
            }
            Ok(AudioCommand::Stop { ack }) => {
                if current.is_some() {
                    info!(target: "chatbuddy::voice", "VoiceOutput: stopped");
                }
                finish(&mut current, PlaybackEnd::Stopped);
                let _ = ack.send(());
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                if current.as_ref().is_some_and(|(sink, _)| sink.empty()) {
                    debug!(target: "chatbuddy::voice", "playback completed");
                    finish(&mut current, PlaybackEnd::Completed);
                }
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                finish(&mut current, PlaybackEnd::Stopped);
                break;
            }
        }
    }
}

#[async_trait]
impl SpeechPlayer for VoiceOutput {
    async fn speak(&self, request: SpeechRequest) -> VoiceResult<Playback> {
        let bytes = self.tts.synthesize(&request).await?;
        if bytes.is_empty() {
            self.stop().await;
            return Ok(Playback::ended(PlaybackEnd::Completed));
        }

        let (done, playback) = Playback::pending();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(AudioCommand::Play {
                bytes,
                done,
                ack: ack_tx,
            })
            .map_err(|_| VoiceError::Playback("audio thread stopped".to_string()))?;
        ack_rx
            .await
            .map_err(|_| VoiceError::Playback("audio thread stopped".to_string()))??;
        Ok(playback)
    }

    async fn stop(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(AudioCommand::Stop { ack }).is_err() {
            warn!(target: "chatbuddy::voice", "stop requested but the audio thread is gone");
            return;
        }
        let _ = done.await;
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_tts_returns_empty() {
        let out = PlaceholderTts.synthesize(&SpeechRequest::new("hello")).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn missing_key_is_synthesis_unavailable() {
        let tts = ElevenLabsTts::new(None).unwrap();
        let err = tts.synthesize(&SpeechRequest::new("hello")).await.unwrap_err();
        assert!(matches!(err, VoiceError::SynthesisUnavailable(_)));
    }

    #[tokio::test]
    async fn blank_text_needs_no_key() {
        let tts = ElevenLabsTts::new(None).unwrap();
        assert!(tts.synthesize(&SpeechRequest::new("  ")).await.unwrap().is_empty());
    }

    #[test]
    fn default_tuning_matches_elevenlabs_defaults() {
        let body = SynthesisBody {
            text: "Hi",
            model_id: ELEVENLABS_MODEL_ID,
            voice_settings: &VoiceTuning::default(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model_id"], "eleven_monolingual_v1");
        assert_eq!(json["voice_settings"]["similarity_boost"], 0.75);
        assert_eq!(json["voice_settings"]["use_speaker_boost"], true);
    }

    #[test]
    fn error_detail_reads_both_shapes() {
        assert_eq!(error_detail(r#"{"detail":"quota exceeded"}"#).as_deref(), Some("quota exceeded"));
        assert_eq!(
            error_detail(r#"{"detail":{"status":"invalid_api_key","message":"Invalid API key"}}"#)
                .as_deref(),
            Some("Invalid API key")
        );
        assert!(error_detail("<html>").is_none());
    }

    #[tokio::test]
    async fn ended_playback_resolves_immediately() {
        assert_eq!(Playback::ended(PlaybackEnd::Completed).finished().await, PlaybackEnd::Completed);
        let (tx, playback) = Playback::pending();
        drop(tx);
        assert_eq!(playback.finished().await, PlaybackEnd::Stopped);
    }

    #[tokio::test]
    #[ignore] // needs an output device
    async fn voice_output_opens_default_device() {
        let output = VoiceOutput::new(Arc::new(PlaceholderTts)).unwrap();
        let playback = output.speak(SpeechRequest::new("hi")).await.unwrap();
        assert_eq!(playback.finished().await, PlaybackEnd::Completed);
        assert!(!output.is_playing());
    }
}
