//! Voice Activity Detection using WebRTC VAD
//!
//! `Vad` is neither `Send` nor `Sync`; a detector lives on the capture thread that created it.

use crate::error::{VoiceError, VoiceResult};
use tracing::{debug, info};
use webrtc_vad::{SampleRate, Vad, VadMode};

#[derive(Debug, Clone)]
pub struct VadConfig {
    /// 8000, 16000, 32000 or 48000 Hz
    pub sample_rate: u32,

    /// Aggressiveness 0-3, where 3 rejects the most non-speech
    pub mode: u8,

    /// Frame length in milliseconds: 10, 20 or 30
    pub frame_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            mode: 2,
            frame_ms: 30,
        }
    }
}

impl VadConfig {
    /// Samples per frame (480 for 30ms at 16kHz).
    pub fn frame_len(&self) -> usize {
        (self.sample_rate as usize * self.frame_ms as usize) / 1000
    }

    fn rate(&self) -> VoiceResult<SampleRate> {
        match self.sample_rate {
            8000 => Ok(SampleRate::Rate8kHz),
            16000 => Ok(SampleRate::Rate16kHz),
            32000 => Ok(SampleRate::Rate32kHz),
            48000 => Ok(SampleRate::Rate48kHz),
            other => Err(VoiceError::Config(format!(
                "WebRTC VAD only supports 8000, 16000, 32000, or 48000 Hz, got {}",
                other
            ))),
        }
    }

    fn vad_mode(&self) -> VoiceResult<VadMode> {
        match self.mode {
            0 => Ok(VadMode::Quality),
            1 => Ok(VadMode::LowBitrate),
            2 => Ok(VadMode::Aggressive),
            3 => Ok(VadMode::VeryAggressive),
            other => Err(VoiceError::Config(format!("VAD mode must be 0-3, got {}", other))),
        }
    }
}

/// Per-frame speech/non-speech classifier
pub struct VadDetector {
    vad: Vad,
    frame_len: usize,
}

impl VadDetector {
    pub fn new(config: &VadConfig) -> VoiceResult<Self> {
        if !matches!(config.frame_ms, 10 | 20 | 30) {
            return Err(VoiceError::VadInit(format!(
                "frame length must be 10, 20 or 30ms, got {}",
                config.frame_ms
            )));
        }
        let rate = config.rate()?;
        let mode = config.vad_mode()?;

        let mut vad = Vad::new();
        vad.set_mode(mode);
        vad.set_sample_rate(rate);

        let frame_len = config.frame_len();
        info!(
            target: "chatbuddy::voice",
            "VAD ready ({}Hz, mode {}, {} samples per frame)",
            config.sample_rate,
            config.mode,
            frame_len
        );
        Ok(Self { vad, frame_len })
    }

    /// Classify one frame of f32 PCM in -1.0..1.0. The frame must be exactly `frame_len` samples.
    pub fn is_speech(&mut self, frame: &[f32]) -> VoiceResult<bool> {
        if frame.len() != self.frame_len {
            return Err(VoiceError::VadProcessing(format!(
                "Expected {} samples, got {}",
                self.frame_len,
                frame.len()
            )));
        }

        let pcm: Vec<i16> = frame
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();

        let speech = self
            .vad
            .is_voice_segment(&pcm)
            .map_err(|e| VoiceError::VadProcessing(format!("{:?}", e)))?;
        debug!(target: "chatbuddy::voice", speech, "vad frame");
        Ok(speech)
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }
}
