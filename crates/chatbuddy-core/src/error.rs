//! Error types for the ChatBuddy core.
//!
//! `TransportError` is what the HTTP client reports. `TurnError` is the taxonomy the
//! orchestrator surfaces to presentation layers; every adapter failure is folded into it.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for turn operations
pub type TurnResult<T> = Result<T, TurnError>;

/// Failures reported by the Transport Client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("No data received")]
    EmptyResponse,
}

/// Turn-level failure taxonomy.
///
/// Each variant renders as the single human-readable message shown through the
/// orchestrator's "last error".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("Speech recognizer is not available: {0}")]
    RecognitionUnavailable(String),

    #[error("Speech recognition not authorized")]
    NotAuthorized,

    #[error("Speech recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Speech synthesis is not available: {0}")]
    SynthesisUnavailable(String),

    #[error("Audio playback failed: {0}")]
    PlaybackFailed(String),

    /// A trigger arrived while another Turn was in flight.
    #[error("Another turn is in progress ({0})")]
    Busy(&'static str),
}

impl TurnError {
    /// True when the failure came from the Transport Client.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_) | Self::Unauthorized | Self::ServerError { .. }
        )
    }
}

impl From<TransportError> for TurnError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized => TurnError::Unauthorized,
            TransportError::Server { status, message } => TurnError::ServerError { status, message },
            other @ (TransportError::InvalidEndpoint(_)
            | TransportError::Transport(_)
            | TransportError::Timeout(_)
            | TransportError::Decode(_)
            | TransportError::EmptyResponse) => TurnError::RequestFailed(other.to_string()),
        }
    }
}

/// Settings file and layered configuration failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration error: {0}")]
    Layered(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_request_failed_with_description() {
        let err: TurnError = TransportError::Timeout(Duration::from_secs(60)).into();
        assert_eq!(
            err,
            TurnError::RequestFailed("Request timed out after 60s".to_string())
        );
        assert!(err.is_transport());
    }

    #[test]
    fn unauthorized_and_server_errors_keep_their_shape() {
        assert_eq!(TurnError::from(TransportError::Unauthorized), TurnError::Unauthorized);
        let err = TurnError::from(TransportError::Server {
            status: 404,
            message: "Session not found".to_string(),
        });
        assert_eq!(err.to_string(), "Server error 404: Session not found");
    }

    #[test]
    fn voice_failures_are_not_transport() {
        assert!(!TurnError::NotAuthorized.is_transport());
        assert!(!TurnError::PlaybackFailed("device lost".into()).is_transport());
    }
}
