//! Ordered message store for one conversation.

use std::collections::HashSet;

use market_client::{Message, MessageId};

/// Messages in display order.
///
/// [`replace`](Self::replace) installs a loaded transcript verbatim.
/// [`append`](Self::append) adds a live message unless one with the same id
/// is already present; messages without an id are always appended.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with `messages`, in the given order.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.ids = messages.iter().filter_map(|m| m.id.clone()).collect();
        self.messages = messages;
    }

    /// Append a message. Returns false if it was a duplicate.
    pub fn append(&mut self, message: Message) -> bool {
        if let Some(id) = &message.id {
            if !self.ids.insert(id.clone()) {
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    pub fn contains_id(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_client::UserRef;

    fn msg(id: i64, body: &str) -> Message {
        Message::new(id, UserRef::Id(1), body)
    }

    fn bodies(t: &Transcript) -> Vec<&str> {
        t.iter().map(|m| m.body.as_str()).collect()
    }

    #[test]
    fn replace_keeps_server_order() {
        let mut t = Transcript::new();
        t.append(msg(9, "stale"));
        t.replace(vec![msg(3, "c"), msg(1, "a"), msg(2, "b")]);
        assert_eq!(bodies(&t), ["c", "a", "b"]);
        assert!(!t.contains_id(&MessageId::Num(9)));
    }

    #[test]
    fn append_skips_known_ids() {
        let mut t = Transcript::new();
        t.replace(vec![msg(1, "hi")]);
        assert!(!t.append(msg(1, "hi again")));
        assert!(t.append(msg(2, "yo")));
        assert!(!t.append(msg(2, "yo")));
        assert_eq!(bodies(&t), ["hi", "yo"]);
    }

    #[test]
    fn duplicate_of_older_message_is_skipped() {
        let mut t = Transcript::new();
        t.replace(vec![msg(1, "a"), msg(2, "b")]);
        assert!(!t.append(msg(1, "a")));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn messages_without_id_always_append() {
        let mut t = Transcript::new();
        let anon = Message {
            body: "no id".into(),
            ..Default::default()
        };
        assert!(t.append(anon.clone()));
        assert!(t.append(anon));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn text_and_numeric_ids_are_distinct() {
        let mut t = Transcript::new();
        t.append(msg(1, "num"));
        let text = Message {
            id: Some(MessageId::Text("1".into())),
            body: "text".into(),
            ..Default::default()
        };
        assert!(t.append(text));
        assert_eq!(t.last().map(|m| m.body.as_str()), Some("text"));
    }
}
