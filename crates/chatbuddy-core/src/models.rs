//! Session and message models shared by the store, the transport and the orchestrator.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend timestamp layout: naive ISO-8601 with microseconds, always UTC.
const BACKEND_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A server-tracked conversation thread.
///
/// `ended_at` and `summary` are owned by the server; the client only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    /// Locally synthesized status/error messages. Never sent to the server.
    System,
}

impl Sender {
    /// Parse a wire sender. The backend says `ai`; other deployments say `assistant` or `bot`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("user") {
            Some(Self::User)
        } else if raw.eq_ignore_ascii_case("ai")
            || raw.eq_ignore_ascii_case("assistant")
            || raw.eq_ignore_ascii_case("bot")
        {
            Some(Self::Assistant)
        } else if raw.eq_ignore_ascii_case("system") {
            Some(Self::System)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One entry in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message that only exists locally until the server confirms it.
    /// Gets a fresh UUID and the local clock.
    pub fn local(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    /// A `system` status message stamped at creation time.
    pub fn system(content: impl Into<String>) -> Self {
        Self::local(Sender::System, content)
    }
}

/// Parse a timestamp from the backend: RFC 3339, or the naive microsecond format (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, BACKEND_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
