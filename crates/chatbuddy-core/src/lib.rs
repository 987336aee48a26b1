//! chatbuddy-core: the non-audio half of the ChatBuddy client.
//!
//! Session/message models, the conversation store the turn orchestrator writes to,
//! the HTTP transport for the chat backend, configuration, and the error taxonomy.

mod settings;
mod error;
mod models;
mod store;
mod transport;

pub use settings::{
    ClientConfig, VoiceSettings, DEFAULT_API_BASE_URL, DEFAULT_HEALTH_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_VOICE_ID,
};
pub use error::{ConfigError, TransportError, TransportResult, TurnError, TurnResult};
pub use models::{parse_timestamp, Message, Sender, Session};
pub use store::{ConversationSnapshot, ConversationStore};
pub use transport::{ChatReply, HttpTransport, Transport};
