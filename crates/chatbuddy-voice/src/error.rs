//! Error types for the ChatBuddy voice adapters

use chatbuddy_core::TurnError;
use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised by the recognizer, the synthesizer and the audio devices
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Speech recognizer is not available: {0}")]
    RecognitionUnavailable(String),

    #[error("Speech recognition not authorized")]
    NotAuthorized,

    #[error("Speech recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("Speech synthesis is not available: {0}")]
    SynthesisUnavailable(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("VAD initialization failed: {0}")]
    VadInit(String),

    #[error("VAD processing error: {0}")]
    VadProcessing(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}

/// Fold adapter failures into the turn taxonomy: recognizer-side problems become
/// recognition errors, everything on the output side becomes a synthesis or playback error.
impl From<VoiceError> for TurnError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::RecognitionUnavailable(cause) => TurnError::RecognitionUnavailable(cause),
            VoiceError::NotAuthorized => TurnError::NotAuthorized,
            VoiceError::RecognitionFailed(cause) => TurnError::RecognitionFailed(cause),
            VoiceError::AudioDevice(cause) | VoiceError::VadInit(cause) => {
                TurnError::RecognitionUnavailable(cause)
            }
            VoiceError::AudioStream(cause)
            | VoiceError::VadProcessing(cause)
            | VoiceError::Stt(cause) => TurnError::RecognitionFailed(cause),
            VoiceError::SynthesisUnavailable(cause)
            | VoiceError::Tts(cause)
            | VoiceError::Config(cause) => TurnError::SynthesisUnavailable(cause),
            VoiceError::Playback(cause) => TurnError::PlaybackFailed(cause),
            VoiceError::Io(e) => TurnError::PlaybackFailed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_read_as_unavailable_recognizer() {
        let err: TurnError = VoiceError::AudioDevice("No input device available".into()).into();
        assert_eq!(
            err,
            TurnError::RecognitionUnavailable("No input device available".into())
        );
    }

    #[test]
    fn output_side_errors_keep_their_category() {
        assert!(matches!(
            TurnError::from(VoiceError::Tts("401".into())),
            TurnError::SynthesisUnavailable(_)
        ));
        assert!(matches!(
            TurnError::from(VoiceError::Playback("device lost".into())),
            TurnError::PlaybackFailed(_)
        ));
    }
}
