//! Test doubles shared by the orchestrator tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chatbuddy_core::{
    ChatReply, ConversationStore, Message, Sender, Session, Transport, TransportError,
    TransportResult,
};
use chatbuddy_voice::{
    Playback, PlaybackEnd, SpeechPlayer, SpeechRequest, TranscriptionEvent, TranscriptionSession,
    TranscriptionSource, TurnOrchestrator, VoiceError, VoiceResult,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Fail the test instead of hanging.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

// -----------------------------------------------------------------------------
// Transport
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub session_id: Option<String>,
    pub text: String,
    pub model: Option<String>,
}

#[derive(Default)]
struct Backend {
    sessions: Vec<Session>,
    history: HashMap<String, Vec<Message>>,
    sent: Vec<SentMessage>,
    next_id: usize,
}

impl Backend {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn open_session(&mut self, title: &str, started_at: DateTime<Utc>) -> Session {
        let session = Session {
            id: self.next("s"),
            owner_id: "u-1".to_string(),
            title: title.to_string(),
            started_at,
            ended_at: None,
            summary: None,
        };
        self.sessions.push(session.clone());
        self.history.insert(session.id.clone(), Vec::new());
        session
    }

    fn server_message(&mut self, sender: Sender, content: String) -> Message {
        Message {
            id: self.next("m"),
            content,
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// In-memory stand-in for the chat backend. Replies with "You said: <text>".
#[derive(Default)]
pub struct FakeTransport {
    backend: Mutex<Backend>,
    delay: Option<Duration>,
    failure: Mutex<Option<TransportError>>,
    lookups_fail: AtomicBool,
    invalidations: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every later `send_message` fails with `err`.
    pub fn fail_with(&self, err: TransportError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    /// While set, `get_session` answers 503.
    pub fn fail_lookups(&self, fail: bool) {
        self.lookups_fail.store(fail, Ordering::SeqCst);
    }

    pub fn rename_session(&self, id: &str, title: &str) {
        let mut backend = self.backend.lock().unwrap();
        if let Some(session) = backend.sessions.iter_mut().find(|s| s.id == id) {
            session.title = title.to_string();
        }
    }

    pub fn seed_session(&self, title: &str, age_minutes: i64, history: &[(Sender, &str)]) -> Session {
        let mut backend = self.backend.lock().unwrap();
        let session = backend.open_session(title, Utc::now() - ChronoDuration::minutes(age_minutes));
        let messages: Vec<Message> = history
            .iter()
            .map(|(sender, text)| backend.server_message(*sender, text.to_string()))
            .collect();
        backend.history.insert(session.id.clone(), messages);
        session
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.backend.lock().unwrap().sent.clone()
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.backend.lock().unwrap().sessions.iter().map(|s| s.id.clone()).collect()
    }
}

fn not_found() -> TransportError {
    TransportError::Server {
        status: 404,
        message: "Session not found".to_string(),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn create_session(&self, title: &str) -> TransportResult<Session> {
        Ok(self.backend.lock().unwrap().open_session(title, Utc::now()))
    }

    async fn list_sessions(&self) -> TransportResult<Vec<Session>> {
        Ok(self.backend.lock().unwrap().sessions.clone())
    }

    async fn get_session(&self, id: &str) -> TransportResult<Session> {
        if self.lookups_fail.load(Ordering::SeqCst) {
            return Err(TransportError::Server {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        self.backend
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn delete_session(&self, id: &str) -> TransportResult<()> {
        let mut backend = self.backend.lock().unwrap();
        let before = backend.sessions.len();
        backend.sessions.retain(|s| s.id != id);
        backend.history.remove(id);
        if backend.sessions.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn send_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        model: Option<&str>,
    ) -> TransportResult<ChatReply> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }

        let mut backend = self.backend.lock().unwrap();
        backend.sent.push(SentMessage {
            session_id: session_id.map(str::to_string),
            text: text.to_string(),
            model: model.map(str::to_string),
        });
        let session_id = match session_id {
            Some(id) if backend.history.contains_key(id) => id.to_string(),
            Some(_) => return Err(not_found()),
            None => backend.open_session("New Conversation", Utc::now()).id,
        };
        let user = backend.server_message(Sender::User, text.to_string());
        let assistant = backend.server_message(Sender::Assistant, format!("You said: {}", text));
        let log = backend.history.entry(session_id.clone()).or_default();
        log.push(user.clone());
        log.push(assistant.clone());
        Ok(ChatReply {
            session_id,
            user_message: user,
            assistant_message: assistant,
        })
    }

    async fn list_messages(&self, session_id: &str) -> TransportResult<Vec<Message>> {
        self.backend
            .lock()
            .unwrap()
            .history
            .get(session_id)
            .cloned()
            .ok_or_else(not_found)
    }

    fn invalidate_credentials(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// Player
// -----------------------------------------------------------------------------

#[derive(Default)]
struct PlayerState {
    spoken: Vec<SpeechRequest>,
    calls: Vec<&'static str>,
    current: Option<oneshot::Sender<PlaybackEnd>>,
    overlapping_speaks: usize,
}

/// Records every call. With `hold_open`, a playback lasts until `complete()` or `stop()`.
#[derive(Default)]
pub struct RecordingPlayer {
    state: Mutex<PlayerState>,
    hold_open: bool,
    fail_synthesis: bool,
    synthesis_delay: Option<Duration>,
}

impl RecordingPlayer {
    pub fn instant() -> Self {
        Self::default()
    }

    pub fn hold_open() -> Self {
        Self {
            hold_open: true,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_synthesis: true,
            ..Default::default()
        }
    }

    /// `speak` takes `delay` before the playback starts, like a slow TTS request.
    pub fn with_synthesis_delay(mut self, delay: Duration) -> Self {
        self.synthesis_delay = Some(delay);
        self
    }

    pub fn spoken(&self) -> Vec<SpeechRequest> {
        self.state.lock().unwrap().spoken.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Times `speak` was called while an earlier playback was still running.
    pub fn overlapping_speaks(&self) -> usize {
        self.state.lock().unwrap().overlapping_speaks
    }

    /// Finish the current playback normally.
    pub fn complete(&self) {
        if let Some(done) = self.state.lock().unwrap().current.take() {
            let _ = done.send(PlaybackEnd::Completed);
        }
    }
}

#[async_trait]
impl SpeechPlayer for RecordingPlayer {
    async fn speak(&self, request: SpeechRequest) -> VoiceResult<Playback> {
        if let Some(delay) = self.synthesis_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push("speak");
        if state.current.is_some() {
            state.overlapping_speaks += 1;
        }
        state.spoken.push(request);
        if self.fail_synthesis {
            return Err(VoiceError::SynthesisUnavailable(
                "ElevenLabs API key not configured".to_string(),
            ));
        }
        if self.hold_open {
            let (done, playback) = Playback::pending();
            state.current = Some(done);
            Ok(playback)
        } else {
            Ok(Playback::ended(PlaybackEnd::Completed))
        }
    }

    async fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push("stop");
        if let Some(done) = state.current.take() {
            let _ = done.send(PlaybackEnd::Stopped);
        }
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().current.is_some()
    }
}

// -----------------------------------------------------------------------------
// Recognizer
// -----------------------------------------------------------------------------

/// Sends one partial, then ignores `stop()` and never finishes.
pub struct StalledTranscriber {
    partial: String,
}

impl StalledTranscriber {
    pub fn new(partial: &str) -> Self {
        Self {
            partial: partial.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptionSource for StalledTranscriber {
    async fn request_authorization(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn start(&self) -> VoiceResult<TranscriptionSession> {
        let (session, feed) = TranscriptionSession::channel(8);
        let partial = self.partial.clone();
        tokio::spawn(async move {
            feed.send(TranscriptionEvent::Partial(partial)).await;
            std::future::pending::<()>().await;
            drop(feed);
        });
        Ok(session)
    }
}

// -----------------------------------------------------------------------------
// Wiring
// -----------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: TurnOrchestrator,
    pub transport: Arc<FakeTransport>,
    pub player: Arc<RecordingPlayer>,
}

pub fn harness(
    transport: FakeTransport,
    transcriber: impl TranscriptionSource + 'static,
    player: RecordingPlayer,
) -> Harness {
    init_tracing();
    let transport = Arc::new(transport);
    let player = Arc::new(player);
    let orchestrator = TurnOrchestrator::new(
        transport.clone(),
        Arc::new(transcriber),
        player.clone(),
        ConversationStore::new(),
    );
    Harness {
        orchestrator,
        transport,
        player,
    }
}
