//! **Turn Orchestrator**: one exchange at a time, from input to spoken reply.
//!
//! ```text
//! Idle → Recording → Transcribed → Sending → AwaitingResponse → Speaking → Idle
//!            │             │                        │               │
//!            └─ Cancelled ─┴──── Errored ───────────┴── Cancelled ──┘ → Idle
//! ```
//!
//! The orchestrator is the only writer of its `ConversationStore`. It owns the three
//! adapters (transport, transcription source, speech player), which are injected at
//! construction. Triggers that would overlap an in-flight turn are rejected with
//! `TurnError::Busy`; a new turn during `Speaking` stops the playback first.
//!
//! Every failure ends in `Errored → Idle` with exactly one last error. Presentation layers
//! read the current state from `view()`/`watch()` and the ordered event log from
//! `subscribe()`.

use crate::transcription::{
    RecognitionFailure, StopHandle, TranscriptionEvent, TranscriptionSession, TranscriptionSource,
};
use crate::turn::{Turn, TurnConfig, TurnEvent, TurnOutcome, TurnPhase};
use crate::voice_output::{PlaybackEnd, SpeechPlayer, SpeechRequest};
use chatbuddy_core::{
    ConversationStore, Message, Sender, Session, Transport, TransportError, TurnError, TurnResult,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long `end_recording` waits for the recognizer to deliver its final text.
const STOP_GRACE: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 128;

/// Read-only state for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnView {
    pub phase: TurnPhase,
    /// Live transcription while recording.
    pub draft: String,
    /// Transcript waiting for `submit_transcript`.
    pub pending_input: Option<String>,
    pub last_error: Option<TurnError>,
    /// Round-trip time of the last successful send.
    pub last_response_time: Option<Duration>,
}

impl Default for TurnView {
    fn default() -> Self {
        Self {
            phase: TurnPhase::Idle,
            draft: String::new(),
            pending_input: None,
            last_error: None,
            last_response_time: None,
        }
    }
}

struct ActiveRecording {
    stop: StopHandle,
    user_stopped: Arc<AtomicBool>,
    consumer: Option<JoinHandle<()>>,
}

struct TurnState {
    phase: TurnPhase,
    /// Bumped whenever a turn starts or is abandoned; background tasks of an older
    /// generation leave the state alone.
    generation: u64,
    draft: String,
    pending_input: Option<String>,
    recording: Option<ActiveRecording>,
    last_error: Option<TurnError>,
    last_response_time: Option<Duration>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    transcriber: Arc<dyn TranscriptionSource>,
    player: Arc<dyn SpeechPlayer>,
    store: ConversationStore,
    state: Mutex<TurnState>,
    /// Held from `speak` until a superseded playback has been stopped, so replies never
    /// overlap on the device. Taken before `state`, never while holding it.
    speech: Mutex<()>,
    view: watch::Sender<TurnView>,
    events: broadcast::Sender<TurnEvent>,
}

/// Cheaply cloneable handle; clones drive the same conversation.
#[derive(Clone)]
pub struct TurnOrchestrator {
    inner: Arc<Inner>,
}

impl TurnOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        transcriber: Arc<dyn TranscriptionSource>,
        player: Arc<dyn SpeechPlayer>,
        store: ConversationStore,
    ) -> Self {
        let (view, _) = watch::channel(TurnView::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                transport,
                transcriber,
                player,
                store,
                state: Mutex::new(TurnState {
                    phase: TurnPhase::Idle,
                    generation: 0,
                    draft: String::new(),
                    pending_input: None,
                    recording: None,
                    last_error: None,
                    last_response_time: None,
                }),
                speech: Mutex::new(()),
                view,
                events,
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Presentation surface
    // -------------------------------------------------------------------------

    pub fn store(&self) -> &ConversationStore {
        &self.inner.store
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.store.messages()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.store.session()
    }

    pub fn view(&self) -> TurnView {
        self.inner.view.borrow().clone()
    }

    pub fn phase(&self) -> TurnPhase {
        self.inner.view.borrow().phase
    }

    pub fn draft(&self) -> String {
        self.inner.view.borrow().draft.clone()
    }

    pub fn pending_input(&self) -> Option<String> {
        self.inner.view.borrow().pending_input.clone()
    }

    pub fn last_error(&self) -> Option<TurnError> {
        self.inner.view.borrow().last_error.clone()
    }

    pub fn last_response_time(&self) -> Option<Duration> {
        self.inner.view.borrow().last_response_time
    }

    /// Latest state, updated after every change.
    pub fn watch(&self) -> watch::Receiver<TurnView> {
        self.inner.view.subscribe()
    }

    /// Every phase change, draft update and surfaced error, in order. Transient phases
    /// (`Errored`, `Cancelled`) are only visible here.
    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.inner.events.subscribe()
    }

    /// Resolve once the orchestrator rests in `phase`.
    pub async fn wait_for_phase(&self, phase: TurnPhase) {
        let mut rx = self.inner.view.subscribe();
        let _ = rx.wait_for(|v| v.phase == phase).await;
    }

    // -------------------------------------------------------------------------
    // Turn actions
    // -------------------------------------------------------------------------

    /// Send typed (or edited) text as a new turn.
    ///
    /// Blank input is ignored without any state change. Returns `Err(Busy)` when another
    /// turn is recording or waiting for a reply.
    pub async fn submit_text(&self, text: &str, config: &TurnConfig) -> TurnResult<TurnOutcome> {
        let input = text.trim();
        if input.is_empty() {
            debug!(target: "chatbuddy::turn", "blank input ignored");
            return Ok(TurnOutcome::Ignored);
        }

        let (turn, generation) = {
            let mut st = self.inner.state.lock().await;
            match st.phase {
                TurnPhase::Recording => return Err(TurnError::Busy("recording in progress")),
                TurnPhase::Sending | TurnPhase::AwaitingResponse => {
                    return Err(TurnError::Busy("waiting for a reply"))
                }
                TurnPhase::Speaking => self.interrupt_playback(&mut st).await,
                TurnPhase::Idle
                | TurnPhase::Transcribed
                | TurnPhase::Errored
                | TurnPhase::Cancelled => {}
            }
            st.generation += 1;
            st.pending_input = None;
            st.draft.clear();
            st.last_error = None;
            let session_id = self.inner.store.session().map(|s| s.id);
            let turn = Turn::new(input, session_id);
            self.set_phase(&mut st, TurnPhase::Sending);
            (turn, st.generation)
        };

        Ok(self.run_turn(turn, generation, config).await)
    }

    /// Send the transcript that is waiting in `Transcribed`.
    pub async fn submit_transcript(&self, config: &TurnConfig) -> TurnResult<TurnOutcome> {
        let pending = {
            let st = self.inner.state.lock().await;
            if st.phase != TurnPhase::Transcribed {
                return Ok(TurnOutcome::Ignored);
            }
            st.pending_input.clone()
        };
        match pending {
            Some(text) => self.submit_text(&text, config).await,
            None => Ok(TurnOutcome::Ignored),
        }
    }

    /// Start listening. Fails with `NotAuthorized` or `RecognitionUnavailable` when the
    /// recognizer cannot run; a reply being spoken is stopped first.
    pub async fn begin_recording(&self, config: &TurnConfig) -> TurnResult<()> {
        let mut st = self.inner.state.lock().await;
        match st.phase {
            TurnPhase::Recording => return Err(TurnError::Busy("already recording")),
            TurnPhase::Transcribed => return Err(TurnError::Busy("a transcript is waiting to be sent")),
            TurnPhase::Sending | TurnPhase::AwaitingResponse => {
                return Err(TurnError::Busy("waiting for a reply"))
            }
            TurnPhase::Speaking => self.interrupt_playback(&mut st).await,
            TurnPhase::Idle | TurnPhase::Errored | TurnPhase::Cancelled => {}
        }

        if !self.inner.transcriber.request_authorization().await {
            let err = TurnError::NotAuthorized;
            self.fail(&mut st, err.clone());
            return Err(err);
        }
        if !self.inner.transcriber.is_available() {
            let err = TurnError::RecognitionUnavailable("no usable input device".to_string());
            self.fail(&mut st, err.clone());
            return Err(err);
        }

        let session = match self.inner.transcriber.start().await {
            Ok(session) => session,
            Err(e) => {
                let err = TurnError::from(e);
                self.fail(&mut st, err.clone());
                return Err(err);
            }
        };

        st.generation += 1;
        st.last_error = None;
        st.pending_input = None;
        st.draft.clear();
        let generation = st.generation;
        let user_stopped = Arc::new(AtomicBool::new(false));
        let stop = session.stop_handle();

        let this = self.clone();
        let consumer = tokio::spawn({
            let user_stopped = Arc::clone(&user_stopped);
            let config = config.clone();
            async move {
                this.consume_transcription(session, generation, user_stopped, config)
                    .await
            }
        });
        st.recording = Some(ActiveRecording {
            stop,
            user_stopped,
            consumer: Some(consumer),
        });
        info!(target: "chatbuddy::turn", generation, "recording");
        self.set_phase(&mut st, TurnPhase::Recording);
        Ok(())
    }

    /// Stop listening. Text heard so far becomes the transcript; returns once the
    /// recognizer has delivered it. No-op when not recording.
    pub async fn end_recording(&self) {
        let (consumer, generation) = {
            let mut st = self.inner.state.lock().await;
            if st.phase != TurnPhase::Recording {
                return;
            }
            let generation = st.generation;
            match st.recording.as_mut() {
                Some(rec) => {
                    rec.user_stopped.store(true, Ordering::SeqCst);
                    rec.stop.stop();
                    (rec.consumer.take(), generation)
                }
                None => return,
            }
        };
        let Some(consumer) = consumer else { return };

        let abort = consumer.abort_handle();
        if tokio::time::timeout(STOP_GRACE, consumer).await.is_err() {
            warn!(target: "chatbuddy::turn", "recognizer did not finish after stop, keeping the draft");
            abort.abort();
            let mut st = self.inner.state.lock().await;
            if st.generation == generation && st.phase == TurnPhase::Recording {
                let draft = st.draft.clone();
                self.finish_recording(&mut st, &draft, true);
            }
        }
    }

    /// Stop the reply being spoken. No-op in any other phase.
    pub async fn stop_playback(&self) {
        let mut st = self.inner.state.lock().await;
        if st.phase == TurnPhase::Speaking {
            self.interrupt_playback(&mut st).await;
        }
    }

    /// Abandon the current turn: discard a recording or a waiting transcript, or stop
    /// speaking. A request already sent cannot be recalled and is left to finish.
    pub async fn cancel_turn(&self) {
        let mut st = self.inner.state.lock().await;
        match st.phase {
            TurnPhase::Recording => {
                st.generation += 1;
                if let Some(rec) = st.recording.take() {
                    rec.stop.stop();
                    if let Some(consumer) = rec.consumer {
                        consumer.abort();
                    }
                }
                self.set_draft(&mut st, String::new());
                self.set_phase(&mut st, TurnPhase::Cancelled);
                self.set_phase(&mut st, TurnPhase::Idle);
            }
            TurnPhase::Transcribed => {
                st.generation += 1;
                st.pending_input = None;
                self.set_phase(&mut st, TurnPhase::Cancelled);
                self.set_phase(&mut st, TurnPhase::Idle);
            }
            TurnPhase::Speaking => self.interrupt_playback(&mut st).await,
            _ => {}
        }
    }

    // -------------------------------------------------------------------------
    // Session actions
    // -------------------------------------------------------------------------

    /// Create a session on the server and make it current, with an empty history.
    pub async fn start_session(&self, title: &str) -> TurnResult<Session> {
        let mut st = self.inner.state.lock().await;
        self.settle_for_session_change(&mut st).await?;
        let session = self
            .inner
            .transport
            .create_session(title)
            .await
            .map_err(|e| self.session_failure(&mut st, e))?;
        info!(target: "chatbuddy::turn", session_id = %session.id, "session started");
        self.inner.store.set_session(session.clone());
        Ok(session)
    }

    /// Make an existing session current and load its history in server order.
    pub async fn load_session(&self, id: &str) -> TurnResult<Session> {
        let mut st = self.inner.state.lock().await;
        self.settle_for_session_change(&mut st).await?;
        let session = self
            .inner
            .transport
            .get_session(id)
            .await
            .map_err(|e| self.session_failure(&mut st, e))?;
        let history = self
            .inner
            .transport
            .list_messages(id)
            .await
            .map_err(|e| self.session_failure(&mut st, e))?;

        let store = &self.inner.store;
        store.clear();
        store.set_session(session.clone());
        for message in history {
            store.append_message(message);
        }
        info!(target: "chatbuddy::turn", session_id = %session.id, messages = store.len(), "session loaded");
        Ok(session)
    }

    /// The user's sessions, newest first.
    pub async fn list_sessions(&self) -> TurnResult<Vec<Session>> {
        match self.inner.transport.list_sessions().await {
            Ok(mut sessions) => {
                sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
                Ok(sessions)
            }
            Err(e) => {
                let mut st = self.inner.state.lock().await;
                Err(self.session_failure(&mut st, e))
            }
        }
    }

    /// Delete a session; the store is cleared when it was the current one.
    pub async fn delete_session(&self, id: &str) -> TurnResult<()> {
        let mut st = self.inner.state.lock().await;
        let is_current = self.inner.store.session().is_some_and(|s| s.id == id);
        if is_current {
            self.settle_for_session_change(&mut st).await?;
        }
        self.inner
            .transport
            .delete_session(id)
            .await
            .map_err(|e| self.session_failure(&mut st, e))?;
        if is_current {
            self.inner.store.clear();
        }
        info!(target: "chatbuddy::turn", session_id = id, "session deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn run_turn(&self, turn: Turn, generation: u64, config: &TurnConfig) -> TurnOutcome {
        let inner = &self.inner;
        inner.store.append_message(Message::local(Sender::User, turn.input.clone()));
        {
            let mut st = inner.state.lock().await;
            self.set_phase(&mut st, TurnPhase::AwaitingResponse);
        }

        info!(target: "chatbuddy::turn", turn = %turn.id, session_id = ?turn.session_id, "sending");
        let started = Instant::now();
        let result = inner
            .transport
            .send_message(turn.session_id.as_deref(), &turn.input, config.model.as_deref())
            .await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                let err = TurnError::from(e);
                if err == TurnError::Unauthorized {
                    inner.transport.invalidate_credentials();
                }
                inner
                    .store
                    .append_message(Message::system(format!("Failed to send message: {}", err)));
                let mut st = inner.state.lock().await;
                self.fail(&mut st, err.clone());
                return TurnOutcome::Failed(err);
            }
        };

        let elapsed = started.elapsed();
        debug!(target: "chatbuddy::turn", turn = %turn.id, ms = elapsed.as_millis() as u64, "reply received");
        self.adopt_session(&reply.session_id).await;
        let assistant = reply.assistant_message;
        inner.store.append_message(assistant.clone());

        let mut st = inner.state.lock().await;
        st.last_response_time = Some(elapsed);
        self.publish(&st);

        if !config.voice_output_enabled || assistant.content.trim().is_empty() {
            self.set_phase(&mut st, TurnPhase::Idle);
            return TurnOutcome::Replied(assistant);
        }

        self.set_phase(&mut st, TurnPhase::Speaking);
        // synthesis can take a while; stop_playback and new triggers must not wait on it
        drop(st);

        let _speech = inner.speech.lock().await;
        inner.player.stop().await;
        let request = SpeechRequest {
            text: assistant.content.clone(),
            voice_id: config.voice_id.clone(),
            api_key: config.tts_api_key.clone(),
        };
        let result = inner.player.speak(request).await;

        let mut st = inner.state.lock().await;
        let current = st.generation == generation && st.phase == TurnPhase::Speaking;
        match result {
            Ok(playback) if current => {
                let this = self.clone();
                tokio::spawn(async move {
                    let end = playback.finished().await;
                    this.finish_playback(generation, end).await;
                });
                TurnOutcome::Replied(assistant)
            }
            Ok(_) => {
                drop(st);
                debug!(target: "chatbuddy::turn", turn = %turn.id, "reply interrupted during synthesis");
                inner.player.stop().await;
                TurnOutcome::Replied(assistant)
            }
            Err(e) if current => {
                let err = TurnError::from(e);
                self.fail(&mut st, err.clone());
                TurnOutcome::Failed(err)
            }
            Err(e) => {
                debug!(target: "chatbuddy::turn", turn = %turn.id, "synthesis failed after interruption: {}", e);
                TurnOutcome::Replied(assistant)
            }
        }
    }

    /// Make the reply's session current when the turn started without one, and replace a
    /// stand-in descriptor once the server can describe the session.
    async fn adopt_session(&self, session_id: &str) {
        let store = &self.inner.store;
        match store.session() {
            Some(current) if current.id == session_id => {
                if !is_stand_in(&current) {
                    return;
                }
                match self.inner.transport.get_session(session_id).await {
                    Ok(session) => {
                        debug!(target: "chatbuddy::turn", session_id, "session details refreshed");
                        store.replace_if_unset(session);
                    }
                    Err(e) => debug!(target: "chatbuddy::turn", "session {} still unknown: {}", session_id, e),
                }
            }
            Some(current) => {
                warn!(
                    target: "chatbuddy::turn",
                    "reply belongs to session {} but {} is current", session_id, current.id
                );
            }
            None => {
                let session = match self.inner.transport.get_session(session_id).await {
                    Ok(session) => session,
                    Err(e) => {
                        warn!(target: "chatbuddy::turn", "could not fetch new session {}: {}", session_id, e);
                        stand_in_session(session_id)
                    }
                };
                store.replace_if_unset(session);
            }
        }
    }

    async fn consume_transcription(
        self,
        mut session: TranscriptionSession,
        generation: u64,
        user_stopped: Arc<AtomicBool>,
        config: TurnConfig,
    ) {
        loop {
            let event = session.next_event().await;
            let mut st = self.inner.state.lock().await;
            if st.generation != generation || st.phase != TurnPhase::Recording {
                return;
            }
            let stopped = user_stopped.load(Ordering::SeqCst);
            let transcript = match event {
                Some(TranscriptionEvent::Partial(text)) => {
                    self.set_draft(&mut st, text);
                    continue;
                }
                Some(TranscriptionEvent::Final(text)) => self.finish_recording(&mut st, &text, stopped),
                Some(TranscriptionEvent::Failed(RecognitionFailure::Cancelled)) | None => {
                    debug!(target: "chatbuddy::turn", "recognizer cancelled, keeping the draft");
                    let draft = st.draft.clone();
                    self.finish_recording(&mut st, &draft, true)
                }
                Some(TranscriptionEvent::Failed(RecognitionFailure::Error(cause))) => {
                    st.recording = None;
                    self.set_draft(&mut st, String::new());
                    self.fail(&mut st, TurnError::RecognitionFailed(cause));
                    None
                }
            };
            drop(st);

            if transcript.is_some() && config.auto_send_transcript {
                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.submit_transcript(&config).await {
                        warn!(target: "chatbuddy::turn", "auto-send skipped: {}", e);
                    }
                });
            }
            return;
        }
    }

    /// Leave `Recording` with `text` as the final transcript. Returns the transcript when
    /// the turn moved on to `Transcribed`. An empty transcript passes through `Cancelled`
    /// when the user or the recognizer called the recording off.
    fn finish_recording(
        &self,
        st: &mut MutexGuard<'_, TurnState>,
        text: &str,
        cancelled: bool,
    ) -> Option<String> {
        st.recording = None;
        self.set_draft(st, String::new());
        let text = text.trim();
        if text.is_empty() {
            if cancelled {
                self.set_phase(st, TurnPhase::Cancelled);
            }
            self.set_phase(st, TurnPhase::Idle);
            return None;
        }
        info!(target: "chatbuddy::turn", chars = text.len(), "transcribed");
        st.pending_input = Some(text.to_string());
        self.set_phase(st, TurnPhase::Transcribed);
        Some(text.to_string())
    }

    async fn finish_playback(&self, generation: u64, end: PlaybackEnd) {
        let mut st = self.inner.state.lock().await;
        if st.generation != generation || st.phase != TurnPhase::Speaking {
            return;
        }
        match end {
            PlaybackEnd::Completed | PlaybackEnd::Stopped => self.set_phase(&mut st, TurnPhase::Idle),
            PlaybackEnd::Failed(cause) => self.fail(&mut st, TurnError::PlaybackFailed(cause)),
        }
    }

    /// Speaking → Cancelled → Idle, with the device quiet before returning.
    async fn interrupt_playback(&self, st: &mut MutexGuard<'_, TurnState>) {
        st.generation += 1;
        self.inner.player.stop().await;
        debug!(target: "chatbuddy::turn", "playback interrupted");
        self.set_phase(st, TurnPhase::Cancelled);
        self.set_phase(st, TurnPhase::Idle);
    }

    async fn settle_for_session_change(&self, st: &mut MutexGuard<'_, TurnState>) -> TurnResult<()> {
        match st.phase {
            TurnPhase::Recording => Err(TurnError::Busy("recording in progress")),
            TurnPhase::Sending | TurnPhase::AwaitingResponse => Err(TurnError::Busy("waiting for a reply")),
            TurnPhase::Speaking => {
                self.interrupt_playback(st).await;
                Ok(())
            }
            TurnPhase::Transcribed => {
                st.generation += 1;
                st.pending_input = None;
                self.set_phase(st, TurnPhase::Cancelled);
                self.set_phase(st, TurnPhase::Idle);
                Ok(())
            }
            TurnPhase::Idle | TurnPhase::Errored | TurnPhase::Cancelled => Ok(()),
        }
    }

    /// Surface a session operation failure without touching the turn phase.
    fn session_failure(&self, st: &mut MutexGuard<'_, TurnState>, err: TransportError) -> TurnError {
        let err = TurnError::from(err);
        if err == TurnError::Unauthorized {
            self.inner.transport.invalidate_credentials();
        }
        warn!(target: "chatbuddy::turn", "session request failed: {}", err);
        st.last_error = Some(err.clone());
        self.emit(TurnEvent::Error(err.clone()));
        self.publish(st);
        err
    }

    /// Errored → Idle with `err` as the last error.
    fn fail(&self, st: &mut MutexGuard<'_, TurnState>, err: TurnError) {
        warn!(target: "chatbuddy::turn", phase = %st.phase, "turn failed: {}", err);
        st.last_error = Some(err.clone());
        self.emit(TurnEvent::Error(err));
        self.set_phase(st, TurnPhase::Errored);
        self.set_phase(st, TurnPhase::Idle);
    }

    fn set_phase(&self, st: &mut MutexGuard<'_, TurnState>, phase: TurnPhase) {
        if st.phase == phase {
            return;
        }
        debug!(target: "chatbuddy::turn", "{} -> {}", st.phase, phase);
        st.phase = phase;
        self.emit(TurnEvent::Phase(phase));
        self.publish(st);
    }

    fn set_draft(&self, st: &mut MutexGuard<'_, TurnState>, draft: String) {
        if st.draft == draft {
            return;
        }
        st.draft = draft.clone();
        self.emit(TurnEvent::Draft(draft));
        self.publish(st);
    }

    fn emit(&self, event: TurnEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn publish(&self, st: &TurnState) {
        self.inner.view.send_replace(TurnView {
            phase: st.phase,
            draft: st.draft.clone(),
            pending_input: st.pending_input.clone(),
            last_error: st.last_error.clone(),
            last_response_time: st.last_response_time,
        });
    }
}

/// Descriptor used when a new session could not be fetched; it has no owner.
fn stand_in_session(id: &str) -> Session {
    Session {
        id: id.to_string(),
        owner_id: String::new(),
        title: "New Conversation".to_string(),
        started_at: Utc::now(),
        ended_at: None,
        summary: None,
    }
}

fn is_stand_in(session: &Session) -> bool {
    session.owner_id.is_empty()
}
