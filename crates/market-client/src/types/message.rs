//! Chat message types exchanged with the backend.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A user key as it travels on the wire.
///
/// The backend accepts either a numeric user id or a username, and route
/// parameters can carry both, so neither side can assume one form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    /// Numeric user id.
    Id(i64),
    /// Username, or a numeric id that arrived as a string.
    Handle(String),
}

impl UserRef {
    /// Parse a route parameter, turning pure-digit strings into numeric ids.
    pub fn coerce(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse() {
                return UserRef::Id(id);
            }
        }
        UserRef::Handle(raw.to_string())
    }

    /// Numeric id, if this is one.
    pub fn as_id(&self) -> Option<i64> {
        match self {
            UserRef::Id(id) => Some(*id),
            UserRef::Handle(_) => None,
        }
    }

    /// True for an empty handle, which the backend cannot resolve.
    pub fn is_empty(&self) -> bool {
        matches!(self, UserRef::Handle(h) if h.is_empty())
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "{}", id),
            UserRef::Handle(handle) => f.write_str(handle),
        }
    }
}

impl From<i64> for UserRef {
    fn from(id: i64) -> Self {
        UserRef::Id(id)
    }
}

impl From<&str> for UserRef {
    fn from(handle: &str) -> Self {
        UserRef::Handle(handle.to_string())
    }
}

/// Message identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Num(i64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Num(n) => write!(f, "{}", n),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MessageId {
    fn from(n: i64) -> Self {
        MessageId::Num(n)
    }
}

/// A single chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Backend id. Absent for messages the backend has not stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    /// Author key.
    #[serde(default, alias = "senderId", skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserRef>,

    /// Author username, when the backend includes it.
    #[serde(
        default,
        alias = "senderName",
        alias = "sender_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_username: Option<String>,

    /// Recipient key.
    #[serde(default, alias = "recipientId", skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<UserRef>,

    /// Text content.
    #[serde(default)]
    pub body: String,

    /// Creation time (UTC).
    #[serde(
        default,
        alias = "createdAt",
        with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
}

impl Message {
    /// Create a stored message with the given id, sender and body.
    pub fn new(id: i64, sender: UserRef, body: impl Into<String>) -> Self {
        Self {
            id: Some(MessageId::Num(id)),
            sender_id: Some(sender),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Set the sender username.
    pub fn with_sender_username(mut self, username: impl Into<String>) -> Self {
        self.sender_username = Some(username.into());
        self
    }

    /// Set the recipient.
    pub fn with_recipient(mut self, recipient: UserRef) -> Self {
        self.recipient_id = Some(recipient);
        self
    }

    /// Set the creation time.
    pub fn with_created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Lenient ISO-8601 timestamps: RFC 3339 with an offset, or naive UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            None => serializer.serialize_none(),
        }
    }

    // Unparseable values become None; a bad timestamp should not drop the message.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }
}
