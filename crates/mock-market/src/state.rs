//! Shared state of the fake backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use market_client::{ChannelEvent, Directive, Message, MessageId, UserRef};
use tokio::sync::{broadcast, Mutex};

/// A registered account.
#[derive(Debug, Clone)]
pub struct MockUser {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Failure injection and timing knobs.
#[derive(Debug, Clone, Default)]
pub(crate) struct Behaviour {
    /// Forced status for `GET /auth/me`.
    pub me_status: Option<StatusCode>,
    /// Forced status for `GET /api/messages`.
    pub history_status: Option<StatusCode>,
    /// Artificial latency of `GET /api/messages`, keyed by the raw `user2` value.
    pub history_delays: HashMap<String, Duration>,
    /// Send `message_history` to a socket after it joins.
    pub replay_history_on_join: bool,
}

pub(crate) struct Inner {
    pub users: Vec<MockUser>,
    pub messages: Vec<Message>,
    pub next_message_id: i64,
    pub received: Vec<Directive>,
    pub behaviour: Behaviour,
}

impl Inner {
    /// Resolve a numeric id or username the way the backend does.
    pub fn resolve(&self, raw: &str) -> Option<i64> {
        if let Ok(id) = raw.parse::<i64>() {
            return Some(id);
        }
        self.users.iter().find(|u| u.username == raw).map(|u| u.id)
    }

    pub fn resolve_ref(&self, user: &UserRef) -> Option<i64> {
        match user {
            UserRef::Id(id) => Some(*id),
            UserRef::Handle(handle) => self.resolve(handle),
        }
    }

    pub fn user(&self, id: i64) -> Option<&MockUser> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn conversation(&self, a: i64, b: i64) -> Vec<Message> {
        let is_pair = |m: &Message| {
            let sender = m.sender_id.as_ref().and_then(UserRef::as_id);
            let recipient = m.recipient_id.as_ref().and_then(UserRef::as_id);
            (sender == Some(a) && recipient == Some(b)) || (sender == Some(b) && recipient == Some(a))
        };
        self.messages.iter().filter(|m| is_pair(m)).cloned().collect()
    }

    pub fn involving(&self, user: i64) -> Vec<Message> {
        let touches = |r: &Option<UserRef>| r.as_ref().and_then(UserRef::as_id) == Some(user);
        self.messages
            .iter()
            .filter(|m| touches(&m.sender_id) || touches(&m.recipient_id))
            .cloned()
            .collect()
    }

    pub fn store(&mut self, sender: i64, recipient: i64, body: String) -> Message {
        let message = Message {
            id: Some(MessageId::Num(self.next_message_id)),
            sender_id: Some(UserRef::Id(sender)),
            sender_username: None,
            recipient_id: Some(UserRef::Id(recipient)),
            body,
            created_at: Some(Utc::now().naive_utc()),
        };
        self.next_message_id += 1;
        self.messages.push(message.clone());
        message
    }
}

/// State shared by every handler and socket.
#[derive(Clone)]
pub struct MarketState {
    pub(crate) inner: Arc<Mutex<Inner>>,
    pub(crate) events: broadcast::Sender<ChannelEvent>,
}

impl MarketState {
    pub(crate) fn new(users: Vec<MockUser>, messages: Vec<Message>, behaviour: Behaviour) -> Self {
        let next_message_id = messages
            .iter()
            .filter_map(|m| match m.id {
                Some(MessageId::Num(n)) => Some(n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                users,
                messages,
                next_message_id,
                received: Vec::new(),
                behaviour,
            })),
            events,
        }
    }

    /// Deliver an event to every connected socket.
    pub fn broadcast(&self, event: ChannelEvent) {
        // No receivers just means no socket is connected.
        let _ = self.events.send(event);
    }
}
