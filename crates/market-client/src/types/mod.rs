//! Wire types for the marketplace backend.

mod channel;
mod identity;
mod message;

pub use channel::{
    events, ChannelEvent, Directive, Frame, HistoryPayload, JoinParams, SendMessageParams,
};
pub use identity::{AuthAck, LoginRequest, Me};
pub use message::{Message, MessageId, UserRef};

use serde::Deserialize;

/// Body of `GET /api/messages`: a bare array or `{messages: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HistoryResponse {
    List(Vec<Message>),
    Wrapped {
        #[serde(default)]
        messages: Vec<Message>,
    },
}

impl HistoryResponse {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            HistoryResponse::List(messages) => messages,
            HistoryResponse::Wrapped { messages } => messages,
        }
    }
}
