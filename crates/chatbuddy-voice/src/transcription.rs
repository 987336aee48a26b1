//! **Transcription Source**: the speech recognizer seen by the turn orchestrator.
//!
//! A source hands out one `TranscriptionSession` per recording. The session is a stream of
//! `Partial` texts ending in exactly one `Final` or `Failed` event. `stop()` asks for a
//! graceful finish: whatever was heard before the stop arrives as the `Final` text.
//!
//! Implementations:
//! - `MicrophoneTranscriber`: cpal capture → WebRTC VAD → endpointing, with partial and
//!   final transcripts from an `SttBackend`.
//! - `ScriptedTranscriber`: replays a fixed script, for tests and demos.

use crate::audio::{AudioCapture, AudioChunk, AudioConfig};
use crate::endpoint::{Endpoint, EndpointConfig, Endpointer, VadState};
use crate::error::{VoiceError, VoiceResult};
use crate::stt::SttBackend;
use crate::vad::{VadConfig, VadDetector};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Why a recognition ended without a normal final result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionFailure {
    /// The recognizer cancelled the request. Benign: the draft so far stands.
    Cancelled,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionEvent {
    Partial(String),
    Final(String),
    Failed(RecognitionFailure),
}

impl TranscriptionEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Partial(_))
    }
}

/// Requests a graceful stop of one session. Cloneable; stopping twice is harmless.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

/// Consumer end of one recording.
#[derive(Debug)]
pub struct TranscriptionSession {
    events: mpsc::Receiver<TranscriptionEvent>,
    stop: StopHandle,
}

/// Producer end of one recording, held by the source implementation.
#[derive(Debug)]
pub struct SessionFeed {
    events: mpsc::Sender<TranscriptionEvent>,
    stop: watch::Receiver<bool>,
}

impl TranscriptionSession {
    /// A connected session/feed pair.
    pub fn channel(capacity: usize) -> (Self, SessionFeed) {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                events: events_rx,
                stop: StopHandle(Arc::new(stop_tx)),
            },
            SessionFeed {
                events: events_tx,
                stop: stop_rx,
            },
        )
    }

    /// Next event; `None` once the source has finished.
    pub async fn next_event(&mut self) -> Option<TranscriptionEvent> {
        self.events.recv().await
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

impl SessionFeed {
    /// Deliver an event. Returns false when the consumer is gone.
    pub async fn send(&self, event: TranscriptionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Resolves once a stop was requested or the session was dropped.
    pub async fn stopped(&mut self) {
        let _ = self.stop.wait_for(|stopped| *stopped).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}

#[async_trait]
pub trait TranscriptionSource: Send + Sync {
    /// Ask for microphone/recognition permission. Returns whether it is granted.
    async fn request_authorization(&self) -> bool;

    /// The recognizer can run right now.
    fn is_available(&self) -> bool;

    /// Begin a recording.
    async fn start(&self) -> VoiceResult<TranscriptionSession>;
}

/// Holds the one-recording-at-a-time flag; released on drop.
struct RecordingGuard(Arc<AtomicBool>);

impl RecordingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> VoiceResult<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(VoiceError::RecognitionUnavailable(
                "a recording is already in progress".to_string(),
            ));
        }
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for RecordingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// Microphone
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub endpoint: EndpointConfig,
    /// How often the buffered audio is re-transcribed for a partial result.
    pub partial_interval: Duration,
    /// Audio kept from before the first speech frame, so onsets are not clipped.
    pub pre_roll: Duration,
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            vad: VadConfig::default(),
            endpoint: EndpointConfig::default(),
            partial_interval: Duration::from_millis(1200),
            pre_roll: Duration::from_millis(300),
        }
    }
}

/// A VAD-labelled frame handed from the capture thread to the collector task.
struct LabeledFrame {
    samples: Vec<f32>,
    speech: bool,
}

enum Finish {
    Stopped,
    EndOfSpeech,
    InputClosed,
}

/// Audio of the current utterance. While silent only the last `pre_roll` samples are
/// kept; once speech starts everything is kept up to `cap` samples.
struct UtteranceBuffer {
    samples: Vec<f32>,
    pre_roll: usize,
    cap: usize,
}

impl UtteranceBuffer {
    fn new(sample_rate: u32, pre_roll: Duration, max_utterance: Duration) -> Self {
        let samples_for = |d: Duration| (d.as_secs_f64() * sample_rate as f64).round() as usize;
        let pre_roll = samples_for(pre_roll);
        Self {
            samples: Vec::new(),
            pre_roll,
            cap: pre_roll + samples_for(max_utterance),
        }
    }

    fn push(&mut self, frame: &[f32], in_speech: bool) {
        self.samples.extend_from_slice(frame);
        let keep = if in_speech { self.cap } else { self.pre_roll };
        if self.samples.len() > keep {
            let excess = self.samples.len() - keep;
            self.samples.drain(..excess);
        }
    }

    fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Live microphone recognizer.
pub struct MicrophoneTranscriber {
    config: MicrophoneConfig,
    stt: Arc<dyn SttBackend>,
    recording: Arc<AtomicBool>,
}

impl MicrophoneTranscriber {
    pub fn new(config: MicrophoneConfig, stt: Arc<dyn SttBackend>) -> VoiceResult<Self> {
        if config.audio.sample_rate != config.vad.sample_rate {
            return Err(VoiceError::Config(format!(
                "Audio sample rate ({}) must match VAD sample rate ({})",
                config.audio.sample_rate, config.vad.sample_rate
            )));
        }
        if config.audio.frame_len != config.vad.frame_len() {
            return Err(VoiceError::Config(format!(
                "Audio frame length ({}) must match the VAD frame ({})",
                config.audio.frame_len,
                config.vad.frame_len()
            )));
        }
        Ok(Self {
            config,
            stt,
            recording: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open the device, VAD and stream on a dedicated thread and forward labelled frames.
    async fn spawn_capture(
        &self,
        frames: mpsc::UnboundedSender<LabeledFrame>,
        halt: Arc<AtomicBool>,
    ) -> VoiceResult<()> {
        let audio = self.config.audio.clone();
        let vad_config = self.config.vad.clone();
        let (ready_tx, ready_rx) = oneshot::channel::<VoiceResult<()>>();

        thread::Builder::new()
            .name("chatbuddy-mic".to_string())
            .spawn(move || {
                let mut vad = match VadDetector::new(&vad_config) {
                    Ok(v) => v,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let capture = match AudioCapture::open(audio) {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let (raw_tx, raw_rx) = std_mpsc::channel::<AudioChunk>();
                let _stream = match capture.start(raw_tx) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while !halt.load(Ordering::SeqCst) {
                    match raw_rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(chunk) => {
                            let speech = vad.is_speech(&chunk.samples).unwrap_or_else(|e| {
                                debug!(target: "chatbuddy::voice", "vad skipped a frame: {}", e);
                                false
                            });
                            let frame = LabeledFrame {
                                samples: chunk.samples,
                                speech,
                            };
                            if frames.send(frame).is_err() {
                                break;
                            }
                        }
                        Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(target: "chatbuddy::voice", "capture thread exiting");
            })?;

        ready_rx.await.map_err(|_| {
            VoiceError::AudioStream("capture thread exited during startup".to_string())
        })?
    }
}

#[async_trait]
impl TranscriptionSource for MicrophoneTranscriber {
    async fn request_authorization(&self) -> bool {
        AudioCapture::input_accessible()
    }

    fn is_available(&self) -> bool {
        AudioCapture::has_input_device()
    }

    async fn start(&self) -> VoiceResult<TranscriptionSession> {
        let guard = RecordingGuard::acquire(&self.recording)?;

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let halt = Arc::new(AtomicBool::new(false));
        if let Err(e) = self.spawn_capture(frames_tx, Arc::clone(&halt)).await {
            return Err(match e {
                VoiceError::AudioDevice(cause) => VoiceError::RecognitionUnavailable(cause),
                other => other,
            });
        }

        let (session, feed) = TranscriptionSession::channel(32);
        let collector = Collector {
            stt: Arc::clone(&self.stt),
            sample_rate: self.config.audio.sample_rate,
            frame: Duration::from_secs_f64(
                self.config.audio.frame_len as f64 / self.config.audio.sample_rate as f64,
            ),
            endpoint: self.config.endpoint.clone(),
            partial_interval: self.config.partial_interval,
            pre_roll: self.config.pre_roll,
        };
        tokio::spawn(async move {
            collector.run(frames_rx, feed).await;
            halt.store(true, Ordering::SeqCst);
            drop(guard);
        });
        info!(target: "chatbuddy::voice", "recording started");
        Ok(session)
    }
}

/// Buffers audio for one recording and turns it into transcription events.
struct Collector {
    stt: Arc<dyn SttBackend>,
    sample_rate: u32,
    frame: Duration,
    endpoint: EndpointConfig,
    partial_interval: Duration,
    pre_roll: Duration,
}

impl Collector {
    async fn run(self, mut frames: mpsc::UnboundedReceiver<LabeledFrame>, mut feed: SessionFeed) {
        let mut endpointer = Endpointer::new(self.endpoint.clone());
        let mut buffer = UtteranceBuffer::new(
            self.sample_rate,
            self.pre_roll,
            self.endpoint.max_utterance,
        );
        let mut heard_speech = false;
        let mut fresh_audio = false;
        let mut last_partial = String::new();

        let mut ticker = tokio::time::interval(self.partial_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        let finish = loop {
            tokio::select! {
                _ = feed.stopped() => break Finish::Stopped,
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        match endpointer.observe(frame.speech, self.frame) {
                            Endpoint::SpeechStarted => heard_speech = true,
                            Endpoint::EndOfSpeech | Endpoint::NoSpeech => break Finish::EndOfSpeech,
                            Endpoint::Discarded => {
                                heard_speech = false;
                                last_partial.clear();
                            }
                            Endpoint::Continue => {}
                        }
                        buffer.push(&frame.samples, endpointer.state() != VadState::Silence);
                        fresh_audio = true;
                    }
                    None => break Finish::InputClosed,
                },
                _ = ticker.tick(), if heard_speech && fresh_audio => {
                    fresh_audio = false;
                    match self.stt.transcribe(buffer.samples(), self.sample_rate).await {
                        Ok(text) if !text.is_empty() && text != last_partial => {
                            last_partial = text.clone();
                            if !feed.send(TranscriptionEvent::Partial(text)).await {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!(target: "chatbuddy::voice", "partial transcription failed: {}", e),
                    }
                }
            }
        };

        let event = match finish {
            Finish::InputClosed => TranscriptionEvent::Failed(RecognitionFailure::Error(
                "audio input closed".to_string(),
            )),
            Finish::Stopped | Finish::EndOfSpeech if !heard_speech => {
                TranscriptionEvent::Final(String::new())
            }
            Finish::Stopped | Finish::EndOfSpeech => {
                match self.stt.transcribe(buffer.samples(), self.sample_rate).await {
                    Ok(text) => TranscriptionEvent::Final(text),
                    Err(e) if !last_partial.is_empty() => {
                        warn!(target: "chatbuddy::voice", "final transcription failed, keeping partial: {}", e);
                        TranscriptionEvent::Final(last_partial)
                    }
                    Err(e) => TranscriptionEvent::Failed(RecognitionFailure::Error(e.to_string())),
                }
            }
        };
        debug!(target: "chatbuddy::voice", ?event, "recording finished");
        feed.send(event).await;
    }
}

// -----------------------------------------------------------------------------
// Scripted
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Partial(String),
    Final(String),
    Fail(RecognitionFailure),
    Pause(Duration),
    /// Hold until `stop()`, then deliver the last partial as final.
    WaitForStop,
}

/// Replays the same script on every `start()`. When the script runs out without a terminal
/// step, the session waits for `stop()` and finalizes with the last partial.
pub struct ScriptedTranscriber {
    script: Vec<ScriptStep>,
    authorized: bool,
    available: bool,
    recording: Arc<AtomicBool>,
    starts: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            authorized: true,
            available: true,
            recording: Arc::new(AtomicBool::new(false)),
            starts: AtomicUsize::new(0),
        }
    }

    pub fn denied(mut self) -> Self {
        self.authorized = false;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// How many recordings were started.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

async fn play_script(script: Vec<ScriptStep>, mut feed: SessionFeed) {
    let mut last_partial = String::new();
    for step in script {
        if feed.is_stopped() {
            break;
        }
        match step {
            ScriptStep::Partial(text) => {
                last_partial = text.clone();
                if !feed.send(TranscriptionEvent::Partial(text)).await {
                    return;
                }
            }
            ScriptStep::Final(text) => {
                feed.send(TranscriptionEvent::Final(text)).await;
                return;
            }
            ScriptStep::Fail(failure) => {
                feed.send(TranscriptionEvent::Failed(failure)).await;
                return;
            }
            ScriptStep::Pause(d) => {
                tokio::select! {
                    _ = tokio::time::sleep(d) => {}
                    _ = feed.stopped() => break,
                }
            }
            ScriptStep::WaitForStop => break,
        }
    }
    feed.stopped().await;
    feed.send(TranscriptionEvent::Final(last_partial)).await;
}

#[async_trait]
impl TranscriptionSource for ScriptedTranscriber {
    async fn request_authorization(&self) -> bool {
        self.authorized
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn start(&self) -> VoiceResult<TranscriptionSession> {
        if !self.authorized {
            return Err(VoiceError::NotAuthorized);
        }
        if !self.available {
            return Err(VoiceError::RecognitionUnavailable(
                "scripted recognizer disabled".to_string(),
            ));
        }
        let guard = RecordingGuard::acquire(&self.recording)?;
        self.starts.fetch_add(1, Ordering::SeqCst);

        let (session, feed) = TranscriptionSession::channel(16);
        let script = self.script.clone();
        tokio::spawn(async move {
            play_script(script, feed).await;
            drop(guard);
        });
        Ok(session)
    }
}
