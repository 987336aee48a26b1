//! Microphone capture using CPAL
//!
//! The cpal `Stream` is `!Send` on some platforms, so it is opened and dropped on the
//! thread that owns it; frames leave that thread over a std channel.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::mpsc::Sender;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 16000)
    pub sample_rate: u32,

    /// Number of channels (default: 1 for mono)
    pub channels: u16,

    /// Samples per emitted frame (default: 480, 30ms at 16kHz)
    pub frame_len: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_len: 480,
        }
    }
}

/// One fixed-size frame from the microphone
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples in -1.0..1.0
    pub samples: Vec<f32>,
    pub captured_at: Instant,
}

pub struct AudioCapture {
    config: AudioConfig,
    device: Device,
    stream_config: StreamConfig,
}

impl AudioCapture {
    /// Open the default input device.
    pub fn open(config: AudioConfig) -> VoiceResult<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::AudioDevice("No input device available".to_string()))?;

        info!(
            target: "chatbuddy::voice",
            "microphone: {} ({}Hz, {} ch)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate,
            config.channels
        );

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            config,
            device,
            stream_config,
        })
    }

    /// Start the input stream. Frames of `frame_len` samples are sent to `frames` until the
    /// returned `Stream` is dropped.
    pub fn start(self, frames: Sender<AudioChunk>) -> VoiceResult<Stream> {
        let frame_len = self.config.frame_len;
        let channels = self.config.channels.max(1) as usize;
        let mut pending = Vec::with_capacity(frame_len);

        let stream = self.device.build_input_stream(
            &self.stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // downmix by taking the first channel
                for frame in data.chunks(channels) {
                    pending.push(frame[0]);
                    if pending.len() == frame_len {
                        let chunk = AudioChunk {
                            samples: std::mem::replace(&mut pending, Vec::with_capacity(frame_len)),
                            captured_at: Instant::now(),
                        };
                        if frames.send(chunk).is_err() {
                            return;
                        }
                    }
                }
            },
            move |err| {
                warn!(target: "chatbuddy::voice", "audio input stream error: {}", err);
            },
            None,
        )?;

        stream.play()?;
        info!(target: "chatbuddy::voice", "microphone capture started");
        Ok(stream)
    }

    /// Names of the available input devices.
    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let devices = cpal::default_host().input_devices()?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// A default input device exists.
    pub fn has_input_device() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    /// The default input device can be queried for a configuration. Platforms that gate the
    /// microphone behind a permission fail here when access is denied.
    pub fn input_accessible() -> bool {
        cpal::default_host()
            .default_input_device()
            .is_some_and(|d| d.default_input_config().is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_16k_mono_30ms() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.frame_len, 480);
    }

    #[test]
    #[ignore] // needs an audio host
    fn lists_input_devices() {
        let devices = AudioCapture::list_input_devices().unwrap();
        assert!(!devices.is_empty());
    }
}
