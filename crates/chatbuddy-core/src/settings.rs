//! Client configuration.
//!
//! Two layers, mirroring how the app splits "where is the backend" from "how should the
//! user's turns behave":
//!
//! | Source | Struct | Notes |
//! |--------|--------|-------|
//! | defaults → `config/chatbuddy.toml` (or `CHATBUDDY_CONFIG`) → `CHATBUDDY__*` env | [`ClientConfig`] | backend URLs, timeout, bearer token, model |
//! | `settings.toml` (created on first run) + env overrides | [`VoiceSettings`] | voice input/output toggles, ElevenLabs key and voice |

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_HEALTH_URL: &str = "http://localhost:8000/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_health_url() -> String {
    DEFAULT_HEALTH_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_voice_id() -> String {
    DEFAULT_VOICE_ID.to_string()
}

fn default_true() -> bool {
    true
}

/// Where the backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the chat API, without trailing slash (e.g. `http://localhost:8000/api`).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Health probe URL; expects `{"status": "ok"}`.
    #[serde(default = "default_health_url")]
    pub health_url: String,
    /// Bounded request timeout for every transport call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bearer token issued by the login flow.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Model requested for replies; server default when unset.
    #[serde(default)]
    pub default_model: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            health_url: default_health_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            auth_token: None,
            default_model: None,
        }
    }
}

impl ClientConfig {
    /// Load from file and environment. Precedence: `CHATBUDDY__*` env > file > defaults.
    /// The file path is `CHATBUDDY_CONFIG` or `config/chatbuddy.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CHATBUDDY_CONFIG")
            .unwrap_or_else(|_| "config/chatbuddy.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("health_url", DEFAULT_HEALTH_URL)?
            .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS as i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("CHATBUDDY").separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Per-user voice preferences, persisted in `settings.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Send a finished transcript without waiting for the user to press send.
    #[serde(default)]
    pub voice_input_enabled: bool,
    /// Speak assistant replies.
    #[serde(default = "default_true")]
    pub voice_output_enabled: bool,
    /// ElevenLabs API key. Consider the OS keychain for anything beyond development.
    #[serde(default)]
    pub elevenlabs_api_key: Option<String>,
    /// ElevenLabs voice used for replies.
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_input_enabled: false,
            voice_output_enabled: true,
            elevenlabs_api_key: None,
            voice_id: default_voice_id(),
            debug_mode: false,
        }
    }
}

impl VoiceSettings {
    /// Default path for the settings file
    pub fn default_path() -> PathBuf {
        PathBuf::from("settings.toml")
    }

    /// Load settings from the default path, creating it on first run.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load settings from `path`; a missing file is created with defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            info!(target: "chatbuddy::config", "no settings at {}, writing defaults", path.display());
            let settings = Self::default();
            settings.save_to_path(path)?;
            Ok(settings)
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Overlay `ELEVENLABS_API_KEY`, `CHATBUDDY_VOICE_ID`, `CHATBUDDY_VOICE_INPUT` and
    /// `CHATBUDDY_VOICE_OUTPUT` when they are set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = env_opt_string("ELEVENLABS_API_KEY") {
            self.elevenlabs_api_key = Some(key);
        }
        if let Some(voice) = env_opt_string("CHATBUDDY_VOICE_ID") {
            self.voice_id = voice;
        }
        self.voice_input_enabled = env_bool("CHATBUDDY_VOICE_INPUT", self.voice_input_enabled);
        self.voice_output_enabled = env_bool("CHATBUDDY_VOICE_OUTPUT", self.voice_output_enabled);
        self
    }

    /// Back to factory defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.elevenlabs_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            if v.is_empty() {
                default
            } else {
                v.eq_ignore_ascii_case("true") || v == "1"
            }
        }
        Err(_) => default,
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
