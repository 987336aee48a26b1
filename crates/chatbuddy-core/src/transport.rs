//! **Transport Client**: the session and chat endpoints of the ChatBuddy backend.
//!
//! `Transport` is the seam the orchestrator depends on; `HttpTransport` is the reqwest
//! implementation. Every call shares one bounded timeout, and every failure comes back
//! as a typed `TransportError`.

use crate::settings::ClientConfig;
use crate::error::{TransportError, TransportResult};
use crate::models::{parse_timestamp, Message, Sender, Session};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a successful send: the server's view of both sides of the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub session_id: String,
    pub user_message: Message,
    pub assistant_message: Message,
}

/// Network calls the orchestrator needs.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn create_session(&self, title: &str) -> TransportResult<Session>;

    async fn list_sessions(&self) -> TransportResult<Vec<Session>>;

    async fn get_session(&self, id: &str) -> TransportResult<Session>;

    async fn delete_session(&self, id: &str) -> TransportResult<()>;

    /// Send `text`. With no `session_id` the server opens a new session.
    async fn send_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        model: Option<&str>,
    ) -> TransportResult<ChatReply>;

    async fn list_messages(&self, session_id: &str) -> TransportResult<Vec<Message>>;

    /// Drop any cached credential after the server answered 401.
    fn invalidate_credentials(&self) {}
}

// Wire shapes (backend field names)

#[derive(Serialize)]
struct SessionCreateRequest<'a> {
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_id: String,
    user_id: String,
    #[serde(default)]
    title: Option<String>,
    start_time: String,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    summary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message_id: String,
    content: String,
    sender: String,
    timestamp: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    session_id: Option<&'a str>,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    session_id: String,
    message: MessageResponse,
    ai_response: MessageResponse,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl TryFrom<SessionResponse> for Session {
    type Error = TransportError;

    fn try_from(raw: SessionResponse) -> Result<Self, Self::Error> {
        let started_at = parse_timestamp(&raw.start_time).ok_or_else(|| {
            TransportError::Decode(format!("bad start_time '{}'", raw.start_time))
        })?;
        let ended_at = match raw.end_time.as_deref() {
            Some(t) => Some(
                parse_timestamp(t)
                    .ok_or_else(|| TransportError::Decode(format!("bad end_time '{}'", t)))?,
            ),
            None => None,
        };
        Ok(Session {
            id: raw.session_id,
            owner_id: raw.user_id,
            title: raw.title.unwrap_or_else(|| "New Conversation".to_string()),
            started_at,
            ended_at,
            summary: raw.summary_text,
        })
    }
}

impl TryFrom<MessageResponse> for Message {
    type Error = TransportError;

    fn try_from(raw: MessageResponse) -> Result<Self, Self::Error> {
        let sender = Sender::parse(&raw.sender)
            .ok_or_else(|| TransportError::Decode(format!("unknown sender '{}'", raw.sender)))?;
        let timestamp = parse_timestamp(&raw.timestamp)
            .ok_or_else(|| TransportError::Decode(format!("bad timestamp '{}'", raw.timestamp)))?;
        Ok(Message {
            id: raw.message_id,
            content: raw.content,
            sender,
            timestamp,
        })
    }
}

/// reqwest-backed transport for the ChatBuddy REST API.
pub struct HttpTransport {
    base_url: String,
    health_url: String,
    timeout: Duration,
    token: RwLock<Option<String>>,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> TransportResult<Self> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Transport(e.to_string()))?;
        info!(target: "chatbuddy::transport", "API base {} (timeout {}s)", config.api_base_url, timeout.as_secs());
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            health_url: config.health_url.clone(),
            timeout,
            token: RwLock::new(config.auth_token.clone()),
            client,
        })
    }

    /// Replace the bearer token (after login).
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn has_token(&self) -> bool {
        self.current_token().is_some()
    }

    fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Probe the backend health endpoint.
    pub async fn check_health(&self) -> TransportResult<bool> {
        let url = Url::parse(&self.health_url)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", self.health_url, e)))?;
        let health: HealthResponse = self.execute(Method::GET, url, None::<&()>).await?;
        Ok(health.status.eq_ignore_ascii_case("ok"))
    }

    fn endpoint(&self, path: &str) -> TransportResult<Url> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", raw, e)))
    }

    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> TransportResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        self.execute(method, url, body).await
    }

    async fn execute<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> TransportResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let bytes = self.fetch(method, url, body).await?;
        if bytes.is_empty() {
            return Err(TransportError::EmptyResponse);
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Send the request and return the body of a 2xx response (possibly empty).
    async fn fetch<B>(&self, method: Method, url: Url, body: Option<&B>) -> TransportResult<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        debug!(target: "chatbuddy::transport", "{} {}", method, url);
        let mut req = self.client.request(method, url);
        if let Some(token) = self.current_token() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(|e| self.request_error(e))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| self.request_error(e))?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|b| b.detail)
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(target: "chatbuddy::transport", "server error {}: {}", status.as_u16(), message);
            return Err(TransportError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(bytes.to_vec())
    }

    fn request_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn create_session(&self, title: &str) -> TransportResult<Session> {
        let raw: SessionResponse = self
            .request(Method::POST, "/sessions/", Some(&SessionCreateRequest { title }))
            .await?;
        raw.try_into()
    }

    async fn list_sessions(&self) -> TransportResult<Vec<Session>> {
        let raw: Vec<SessionResponse> = self.request(Method::GET, "/sessions/", None::<&()>).await?;
        raw.into_iter().map(Session::try_from).collect()
    }

    async fn get_session(&self, id: &str) -> TransportResult<Session> {
        let raw: SessionResponse = self
            .request(Method::GET, &format!("/sessions/{}", id), None::<&()>)
            .await?;
        raw.try_into()
    }

    async fn delete_session(&self, id: &str) -> TransportResult<()> {
        // 204 No Content on success
        let url = self.endpoint(&format!("/sessions/{}", id))?;
        self.fetch(Method::DELETE, url, None::<&()>).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        model: Option<&str>,
    ) -> TransportResult<ChatReply> {
        let body = ChatRequest {
            session_id,
            message: text,
            model,
        };
        let raw: ChatResponse = self.request(Method::POST, "/chat/message", Some(&body)).await?;
        Ok(ChatReply {
            session_id: raw.session_id,
            user_message: raw.message.try_into()?,
            assistant_message: raw.ai_response.try_into()?,
        })
    }

    async fn list_messages(&self, session_id: &str) -> TransportResult<Vec<Message>> {
        let raw: Vec<MessageResponse> = self
            .request(Method::GET, &format!("/chat/messages/{}", session_id), None::<&()>)
            .await?;
        raw.into_iter().map(Message::try_from).collect()
    }

    fn invalidate_credentials(&self) {
        if self.has_token() {
            info!(target: "chatbuddy::transport", "dropping bearer token after 401");
        }
        self.set_token(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_without_end_time_decodes() {
        let raw: SessionResponse = serde_json::from_str(
            r#"{"session_id":"s1","user_id":"u1","title":"Trip planning","start_time":"2024-05-01T09:30:00.000001","end_time":null,"summary_text":null}"#,
        )
        .unwrap();
        let session = Session::try_from(raw).unwrap();
        assert_eq!(session.title, "Trip planning");
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn unknown_sender_is_a_decode_failure() {
        let raw = MessageResponse {
            message_id: "m1".into(),
            content: "hi".into(),
            sender: "narrator".into(),
            timestamp: "2024-05-01T09:30:00.000001".into(),
        };
        assert!(matches!(Message::try_from(raw), Err(TransportError::Decode(_))));
    }

    #[test]
    fn chat_request_omits_missing_model() {
        let body = ChatRequest {
            session_id: None,
            message: "Hi",
            model: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"session_id": null, "message": "Hi"}));
    }

    #[test]
    fn malformed_base_url_is_invalid_endpoint() {
        let config = ClientConfig {
            api_base_url: "not a url".into(),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert!(matches!(
            transport.endpoint("/sessions/"),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }
}
