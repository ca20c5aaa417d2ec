//! Live channel frames, outgoing directives and incoming events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{Message, UserRef};

/// Event names used on the live channel.
pub mod events {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const MESSAGE_HISTORY: &str = "message_history";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const JOIN: &str = "join";
    pub const SEND_MESSAGE: &str = "send_message";
}

/// One WebSocket text frame: a named event with a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Build a frame from an event name and a serializable payload.
    pub fn new<T: Serialize>(event: &str, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Parse a frame from WebSocket text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode the frame as WebSocket text.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of `join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinParams {
    pub user_id: UserRef,
}

/// Payload of `send_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageParams {
    pub sender_id: UserRef,
    pub recipient_id: UserRef,
    pub body: String,
}

/// A directive sent from the client to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Subscribe this connection to a user's messages.
    Join(JoinParams),
    /// Store and deliver a message.
    SendMessage(SendMessageParams),
}

impl Directive {
    /// Create a `join` directive.
    pub fn join(user_id: UserRef) -> Self {
        Directive::Join(JoinParams { user_id })
    }

    /// Create a `send_message` directive.
    pub fn send_message(sender_id: UserRef, recipient_id: UserRef, body: impl Into<String>) -> Self {
        Directive::SendMessage(SendMessageParams {
            sender_id,
            recipient_id,
            body: body.into(),
        })
    }

    /// Event name of this directive.
    pub fn event(&self) -> &'static str {
        match self {
            Directive::Join(_) => events::JOIN,
            Directive::SendMessage(_) => events::SEND_MESSAGE,
        }
    }

    /// Encode as a wire frame.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        match self {
            Directive::Join(params) => Frame::new(self.event(), params),
            Directive::SendMessage(params) => Frame::new(self.event(), params),
        }
    }

    /// Decode a directive. Unknown events yield `Ok(None)`.
    pub fn from_frame(frame: Frame) -> Result<Option<Self>, serde_json::Error> {
        match frame.event.as_str() {
            events::JOIN => Ok(Some(Directive::Join(serde_json::from_value(frame.data)?))),
            events::SEND_MESSAGE => Ok(Some(Directive::SendMessage(serde_json::from_value(
                frame.data,
            )?))),
            _ => Ok(None),
        }
    }
}

/// Payload of `message_history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryPayload {
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

/// An event observed on the live channel.
///
/// `Connected`, `Disconnected` and `ConnectError` come from the transport
/// lifecycle; the others are decoded from frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Connection established.
    Connected,
    /// Connection lost or closed.
    Disconnected { reason: String },
    /// Connection could not be established.
    ConnectError(String),
    /// Full transcript replay.
    MessageHistory(Vec<Message>),
    /// One new message.
    NewMessage(Message),
}

impl ChannelEvent {
    /// Event name as used on the wire.
    pub fn event(&self) -> &'static str {
        match self {
            ChannelEvent::Connected => events::CONNECT,
            ChannelEvent::Disconnected { .. } => events::DISCONNECT,
            ChannelEvent::ConnectError(_) => events::CONNECT_ERROR,
            ChannelEvent::MessageHistory(_) => events::MESSAGE_HISTORY,
            ChannelEvent::NewMessage(_) => events::NEW_MESSAGE,
        }
    }

    /// Decode a frame received from the backend.
    ///
    /// Returns `Ok(None)` for unknown events and for `message_history`
    /// frames that carry no message array.
    pub fn from_frame(frame: Frame) -> Result<Option<Self>, serde_json::Error> {
        match frame.event.as_str() {
            events::MESSAGE_HISTORY => {
                let payload: HistoryPayload = serde_json::from_value(frame.data)?;
                Ok(payload.messages.map(ChannelEvent::MessageHistory))
            }
            events::NEW_MESSAGE => Ok(Some(ChannelEvent::NewMessage(serde_json::from_value(
                frame.data,
            )?))),
            _ => Ok(None),
        }
    }

    /// Encode a frame-carried event. Lifecycle events have no frame.
    pub fn to_frame(&self) -> Result<Option<Frame>, serde_json::Error> {
        match self {
            ChannelEvent::MessageHistory(messages) => Ok(Some(Frame::new(
                self.event(),
                &HistoryPayload {
                    messages: Some(messages.clone()),
                },
            )?)),
            ChannelEvent::NewMessage(message) => Ok(Some(Frame::new(self.event(), message)?)),
            _ => Ok(None),
        }
    }
}
