//! Endpointing: deciding from per-frame VAD results when the user has finished an utterance.
//!
//! "Gap logic": speech followed by 800ms of silence ends the utterance. Bursts shorter than
//! the minimum speech duration are dropped as noise, and an utterance that runs past the
//! maximum duration is closed regardless. A recording that hears nothing but silence for
//! `max_listen` gives up.
//!
//! The endpointer counts audio time rather than wall-clock time, so the same frames always
//! produce the same decisions.

use std::time::Duration;
use tracing::debug;

/// Endpointing thresholds
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Silence after speech that ends the utterance (default: 800ms)
    pub silence_gap: Duration,

    /// Speech shorter than this is treated as noise (default: 200ms)
    pub min_speech: Duration,

    /// Hard cap on one utterance (default: 30s)
    pub max_utterance: Duration,

    /// Unbroken silence before listening gives up (default: 10s)
    pub max_listen: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            silence_gap: Duration::from_millis(800),
            min_speech: Duration::from_millis(200),
            max_utterance: Duration::from_secs(30),
            max_listen: Duration::from_secs(10),
        }
    }
}

/// Silence → Speech → PostSpeechGap → (end of speech) → Silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    Speech,
    /// Speech stopped; counting silence toward the gap.
    PostSpeechGap,
}

/// What a single frame meant for the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Continue,
    SpeechStarted,
    /// The utterance is over; finalize the transcript.
    EndOfSpeech,
    /// A burst too short to be speech ended.
    Discarded,
    /// Only silence for `max_listen`.
    NoSpeech,
}

#[derive(Debug, Clone)]
pub struct Endpointer {
    config: EndpointConfig,
    state: VadState,
    speech: Duration,
    gap: Duration,
    utterance: Duration,
    idle: Duration,
}

impl Endpointer {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            state: VadState::Silence,
            speech: Duration::ZERO,
            gap: Duration::ZERO,
            utterance: Duration::ZERO,
            idle: Duration::ZERO,
        }
    }

    /// Feed one frame's VAD decision and its length.
    pub fn observe(&mut self, is_speech: bool, frame: Duration) -> Endpoint {
        match (self.state, is_speech) {
            (VadState::Silence, false) => {
                self.idle += frame;
                if self.idle >= self.config.max_listen {
                    debug!(target: "chatbuddy::voice", "no speech before the listen limit");
                    self.reset();
                    return Endpoint::NoSpeech;
                }
                return Endpoint::Continue;
            }
            (VadState::Silence, true) => {
                debug!(target: "chatbuddy::voice", "speech started");
                self.state = VadState::Speech;
                self.idle = Duration::ZERO;
                self.speech = frame;
                self.gap = Duration::ZERO;
                self.utterance = frame;
                return self.check_max().unwrap_or(Endpoint::SpeechStarted);
            }
            (VadState::Speech, true) => {
                self.speech += frame;
                self.utterance += frame;
            }
            (VadState::PostSpeechGap, true) => {
                self.state = VadState::Speech;
                self.gap = Duration::ZERO;
                self.speech += frame;
                self.utterance += frame;
            }
            (VadState::Speech, false) | (VadState::PostSpeechGap, false) => {
                self.state = VadState::PostSpeechGap;
                self.gap += frame;
                self.utterance += frame;
                if self.gap >= self.config.silence_gap {
                    let enough = self.speech >= self.config.min_speech;
                    self.reset();
                    return if enough {
                        debug!(target: "chatbuddy::voice", "silence gap reached, end of speech");
                        Endpoint::EndOfSpeech
                    } else {
                        debug!(target: "chatbuddy::voice", "speech burst too short, dropped");
                        Endpoint::Discarded
                    };
                }
            }
        }
        self.check_max().unwrap_or(Endpoint::Continue)
    }

    fn check_max(&mut self) -> Option<Endpoint> {
        if self.utterance >= self.config.max_utterance {
            debug!(target: "chatbuddy::voice", "max utterance length reached");
            self.reset();
            Some(Endpoint::EndOfSpeech)
        } else {
            None
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.speech = Duration::ZERO;
        self.gap = Duration::ZERO;
        self.utterance = Duration::ZERO;
        self.idle = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(30);

    fn feed(ep: &mut Endpointer, speech: bool, frames: usize) -> Vec<Endpoint> {
        (0..frames).map(|_| ep.observe(speech, FRAME)).collect()
    }

    #[test]
    fn speech_then_gap_ends_utterance() {
        let mut ep = Endpointer::new(EndpointConfig::default());
        assert_eq!(ep.observe(true, FRAME), Endpoint::SpeechStarted);
        feed(&mut ep, true, 20);
        assert_eq!(ep.state(), VadState::Speech);

        // 26 * 30ms = 780ms: not yet
        let quiet = feed(&mut ep, false, 26);
        assert!(quiet.iter().all(|e| *e == Endpoint::Continue));
        assert_eq!(ep.state(), VadState::PostSpeechGap);

        assert_eq!(ep.observe(false, FRAME), Endpoint::EndOfSpeech);
        assert_eq!(ep.state(), VadState::Silence);
    }

    #[test]
    fn resumed_speech_restarts_the_gap() {
        let mut ep = Endpointer::new(EndpointConfig::default());
        feed(&mut ep, true, 10);
        feed(&mut ep, false, 20);
        assert_eq!(ep.observe(true, FRAME), Endpoint::Continue);
        let quiet = feed(&mut ep, false, 26);
        assert!(!quiet.contains(&Endpoint::EndOfSpeech));
    }

    #[test]
    fn short_burst_is_discarded() {
        let mut ep = Endpointer::new(EndpointConfig::default());
        feed(&mut ep, true, 3); // 90ms
        let out = feed(&mut ep, false, 27);
        assert_eq!(out.last(), Some(&Endpoint::Discarded));
        assert_eq!(ep.state(), VadState::Silence);
    }

    #[test]
    fn max_utterance_forces_end() {
        let mut ep = Endpointer::new(EndpointConfig {
            max_utterance: Duration::from_millis(300),
            ..Default::default()
        });
        let out = feed(&mut ep, true, 10);
        assert_eq!(out.first(), Some(&Endpoint::SpeechStarted));
        assert_eq!(out.last(), Some(&Endpoint::EndOfSpeech));
    }

    #[test]
    fn silence_alone_hits_the_listen_limit() {
        let mut ep = Endpointer::new(EndpointConfig {
            max_listen: Duration::from_millis(900),
            ..Default::default()
        });
        let out = feed(&mut ep, false, 30);
        assert!(out[..29].iter().all(|e| *e == Endpoint::Continue));
        assert_eq!(out[29], Endpoint::NoSpeech);
    }

    #[test]
    fn noise_restarts_the_listen_limit() {
        let mut ep = Endpointer::new(EndpointConfig {
            max_listen: Duration::from_millis(900),
            ..Default::default()
        });
        feed(&mut ep, false, 20);
        feed(&mut ep, true, 3);
        // the 27th quiet frame closes the gap and drops the burst
        assert_eq!(feed(&mut ep, false, 27).last(), Some(&Endpoint::Discarded));
        let out = feed(&mut ep, false, 29);
        assert!(!out.contains(&Endpoint::NoSpeech));
        assert_eq!(ep.observe(false, FRAME), Endpoint::NoSpeech);
    }

    #[test]
    fn leading_silence_is_ignored() {
        let mut ep = Endpointer::new(EndpointConfig::default());
        assert!(feed(&mut ep, false, 100).iter().all(|e| *e == Endpoint::Continue));
        assert_eq!(ep.state(), VadState::Silence);
    }
}
