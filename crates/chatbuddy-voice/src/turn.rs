//! Turn vocabulary: phases, per-turn configuration, events and outcomes.

use chatbuddy_core::{ClientConfig, Message, TurnError, VoiceSettings};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where the orchestrator is in the current turn.
///
/// `Errored` and `Cancelled` are transient: they are announced and then the orchestrator
/// settles in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Recording,
    Transcribed,
    Sending,
    AwaitingResponse,
    Speaking,
    Errored,
    Cancelled,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribed => "transcribed",
            Self::Sending => "sending",
            Self::AwaitingResponse => "awaiting_response",
            Self::Speaking => "speaking",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        }
    }

    /// A request to the backend is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Sending | Self::AwaitingResponse)
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-initiated exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub id: Uuid,
    /// Trimmed input text.
    pub input: String,
    /// Session the turn was sent in; `None` lets the server open one.
    pub session_id: Option<String>,
}

impl Turn {
    pub fn new(input: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: input.into(),
            session_id,
        }
    }
}

/// Settings that apply to a single turn, captured when the turn starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnConfig {
    /// Speak the assistant reply.
    pub voice_output_enabled: bool,
    /// Send a finished transcript without waiting for `submit_transcript`.
    pub auto_send_transcript: bool,
    /// Model requested from the backend.
    pub model: Option<String>,
    /// Voice for the reply; player default when `None`.
    pub voice_id: Option<String>,
    /// Synthesis API key; player default when `None`.
    pub tts_api_key: Option<String>,
}

impl TurnConfig {
    pub fn from_settings(settings: &VoiceSettings, client: &ClientConfig) -> Self {
        Self {
            voice_output_enabled: settings.voice_output_enabled,
            auto_send_transcript: settings.voice_input_enabled,
            model: client.default_model.clone(),
            voice_id: Some(settings.voice_id.clone()),
            tts_api_key: settings.api_key().map(str::to_string),
        }
    }

    /// Typed input, no speech.
    pub fn text_only() -> Self {
        Self::default()
    }
}

/// Everything the orchestrator announces, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Phase(TurnPhase),
    /// The transcription draft changed (empty when cleared).
    Draft(String),
    /// A failure surfaced as the last error.
    Error(TurnError),
}

/// How a call that may start a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing to do (blank input).
    Ignored,
    /// The backend answered; the assistant message was appended.
    Replied(Message),
    /// The turn ended in `Errored`; the error is also the last error.
    Failed(TurnError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_drive_turn_config() {
        let settings = VoiceSettings {
            voice_input_enabled: true,
            voice_output_enabled: false,
            elevenlabs_api_key: Some("xi-key".into()),
            ..Default::default()
        };
        let client = ClientConfig {
            default_model: Some("gpt-4o-mini".into()),
            ..Default::default()
        };
        let config = TurnConfig::from_settings(&settings, &client);
        assert!(config.auto_send_transcript);
        assert!(!config.voice_output_enabled);
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.tts_api_key.as_deref(), Some("xi-key"));
        assert_eq!(config.voice_id.as_deref(), Some(chatbuddy_core::DEFAULT_VOICE_ID));
    }

    #[test]
    fn only_send_phases_are_in_flight() {
        assert!(TurnPhase::Sending.is_in_flight());
        assert!(TurnPhase::AwaitingResponse.is_in_flight());
        assert!(!TurnPhase::Speaking.is_in_flight());
        assert_eq!(TurnPhase::AwaitingResponse.to_string(), "awaiting_response");
    }
}
