//! # ChatBuddy Voice - turn orchestration for spoken conversations
//!
//! Drives a conversation one turn at a time: listen (or take typed text), send to the
//! ChatBuddy backend, record the reply, speak it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        TurnOrchestrator                          │
//! │  ┌────────────────────┐  ┌─────────────┐  ┌──────────────────┐   │
//! │  │ TranscriptionSource│→ │  Transport  │→ │  SpeechPlayer    │   │
//! │  │ mic → VAD → STT    │  │ (core, HTTP)│  │ ElevenLabs→rodio │   │
//! │  └────────────────────┘  └─────────────┘  └──────────────────┘   │
//! │              ↓                 ↓                  ↓              │
//! │        ┌───────────────────────────────────────────────┐         │
//! │        │        ConversationStore (single writer)      │         │
//! │        └───────────────────────────────────────────────┘         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod endpoint;
pub mod error;
pub mod orchestrator;
pub mod stt;
pub mod transcription;
pub mod turn;
pub mod vad;
pub mod voice_output;

pub use audio::{AudioCapture, AudioChunk, AudioConfig};
pub use endpoint::{Endpoint, EndpointConfig, Endpointer, VadState};
pub use error::{VoiceError, VoiceResult};
pub use orchestrator::{TurnOrchestrator, TurnView};
pub use stt::{PlaceholderStt, SttBackend, WhisperApiStt};
pub use transcription::{
    MicrophoneConfig, MicrophoneTranscriber, RecognitionFailure, ScriptStep, ScriptedTranscriber,
    SessionFeed, StopHandle, TranscriptionEvent, TranscriptionSession, TranscriptionSource,
};
pub use turn::{Turn, TurnConfig, TurnEvent, TurnOutcome, TurnPhase};
pub use vad::{VadConfig, VadDetector};
pub use voice_output::{
    ElevenLabsTts, PlaceholderTts, Playback, PlaybackEnd, SpeechPlayer, SpeechRequest,
    TtsBackend, VoiceInfo, VoiceOutput, VoiceTuning,
};
