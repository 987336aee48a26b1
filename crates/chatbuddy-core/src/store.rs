//! **Conversation Store**: the in-memory view of one session and its messages.
//!
//! The store is a single-writer, many-reader log: the turn orchestrator mutates it and
//! presentation layers observe it through `subscribe()`. Messages are kept in arrival
//! order and are never edited or removed individually; switching to a different session
//! drops the previous session's messages with it.

use crate::models::{Message, Session};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A stable copy of the store contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub session: Option<Session>,
    pub messages: Vec<Message>,
}

/// Cheaply cloneable handle to the conversation log.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    state: Arc<watch::Sender<ConversationSnapshot>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConversationSnapshot::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Make `session` the active session. A different session id drops the current
    /// messages; the same id replaces the descriptor and keeps the history.
    pub fn set_session(&self, session: Session) {
        self.state.send_modify(|snapshot| {
            let same = snapshot
                .session
                .as_ref()
                .is_some_and(|current| current.id == session.id);
            if !same {
                debug!(target: "chatbuddy::store", session_id = %session.id, "switching session");
                snapshot.messages.clear();
            }
            snapshot.session = Some(session);
        });
    }

    /// Adopt `session` if none is set, or refresh it if the server changed its fields.
    /// A session with a different id is ignored. Returns whether the store changed.
    pub fn replace_if_unset(&self, session: Session) -> bool {
        self.state.send_if_modified(|snapshot| match &snapshot.session {
            None => {
                debug!(target: "chatbuddy::store", session_id = %session.id, "adopting session");
                snapshot.session = Some(session);
                true
            }
            Some(current) if current.id == session.id && *current != session => {
                snapshot.session = Some(session);
                true
            }
            Some(_) => false,
        })
    }

    /// Append a message. Appending an id that is already present is a no-op.
    /// Returns whether the message was added.
    pub fn append_message(&self, message: Message) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.messages.iter().any(|m| m.id == message.id) {
                debug!(target: "chatbuddy::store", message_id = %message.id, "duplicate append ignored");
                return false;
            }
            snapshot.messages.push(message);
            true
        })
    }

    /// Forget the session and every message.
    pub fn clear(&self) {
        self.state.send_modify(|snapshot| {
            snapshot.session = None;
            snapshot.messages.clear();
        });
    }

    /// Ordered copy of the messages.
    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.state.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.state.borrow().messages.iter().any(|m| m.id == message_id)
    }

    /// Read-only observer; notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;
    use chrono::Utc;

    fn session(id: &str, title: &str) -> Session {
        Session {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            title: title.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            summary: None,
        }
    }

    #[test]
    fn append_is_idempotent_by_id() {
        let store = ConversationStore::new();
        let msg = Message::local(Sender::User, "hello");
        assert!(store.append_message(msg.clone()));
        assert!(!store.append_message(msg.clone()));
        assert_eq!(store.len(), 1);
        assert!(store.contains(&msg.id));
    }

    #[test]
    fn messages_keep_arrival_order() {
        let store = ConversationStore::new();
        let later = Message::local(Sender::Assistant, "second");
        let mut earlier = Message::local(Sender::User, "first");
        earlier.timestamp = later.timestamp - chrono::Duration::seconds(5);
        store.append_message(later.clone());
        store.append_message(earlier.clone());
        let ids: Vec<_> = store.messages().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![later.id, earlier.id]);
    }

    #[test]
    fn switching_session_drops_messages() {
        let store = ConversationStore::new();
        store.set_session(session("s1", "One"));
        store.append_message(Message::local(Sender::User, "hi"));
        store.set_session(session("s1", "One renamed"));
        assert_eq!(store.len(), 1);
        store.set_session(session("s2", "Two"));
        assert!(store.is_empty());
        assert_eq!(store.session().unwrap().id, "s2");
    }

    #[test]
    fn replace_if_unset_keeps_pending_messages() {
        let store = ConversationStore::new();
        store.append_message(Message::local(Sender::User, "hi"));
        assert!(store.replace_if_unset(session("s1", "New Conversation")));
        assert_eq!(store.len(), 1);
        // different id is ignored, identical descriptor is a no-op
        assert!(!store.replace_if_unset(session("s9", "Other")));
        let current = store.session().unwrap();
        assert!(!store.replace_if_unset(current.clone()));
        let mut closed = current;
        closed.summary = Some("Talked about trains".into());
        assert!(store.replace_if_unset(closed));
        assert_eq!(store.session().unwrap().summary.as_deref(), Some("Talked about trains"));
    }

    #[tokio::test]
    async fn observers_see_changes() {
        let store = ConversationStore::new();
        let mut rx = store.subscribe();
        store.append_message(Message::system("Failed to send message"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().messages.len(), 1);
        store.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().messages.is_empty());
    }
}
