//! Conversation view state and its transitions.
//!
//! [`ChatState`] performs no I/O. Each transition mutates the state and
//! returns the [`Effect`]s the driver must carry out.

use std::fmt;

use market_client::{ChannelEvent, ClientError, Directive, Me, Message};
use tracing::{debug, warn};

use crate::error::SendRejected;
use crate::identity::Identity;
use crate::ownership::{self, OwnershipRule};
use crate::route::RouteParams;
use crate::transcript::Transcript;

/// Status of the live channel as shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        })
    }
}

/// Parameters of a transcript query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryKey {
    pub user1: String,
    pub user2: String,
}

/// A transcript fetch issued by the view.
///
/// Only the most recently issued request may populate the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub seq: u64,
    pub key: HistoryKey,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch the transcript and report back through
    /// [`ChatState::history_loaded`].
    LoadHistory(HistoryRequest),
    /// Send a directive on the live channel.
    Emit(Directive),
    /// Bring the newest message into view.
    ScrollToLatest,
}

/// A message ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub message: Message,
    pub mine: bool,
    /// Ownership rule that matched, if any.
    pub rule: Option<OwnershipRule>,
}

/// Everything the UI needs to draw the view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub identity: Identity,
    pub partner: String,
    pub connection: ConnectionState,
    pub messages: Vec<RenderedMessage>,
    pub error: Option<String>,
    pub draft: String,
    /// Bumped every time the view scrolls to the latest message.
    pub scroll_epoch: u64,
}

impl ViewSnapshot {
    /// Bodies in display order.
    pub fn bodies(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.message.body.as_str()).collect()
    }
}

/// State of one active conversation view.
#[derive(Debug, Clone)]
pub struct ChatState {
    route: RouteParams,
    identity: Identity,
    transcript: Transcript,
    connection: ConnectionState,
    error: Option<String>,
    draft: String,
    history_seq: u64,
    pending_history: Option<HistoryRequest>,
    // Live messages appended while `pending_history` was in flight.
    arrived_while_loading: Vec<Message>,
    scroll_epoch: u64,
}

impl ChatState {
    pub fn new(route: RouteParams) -> Self {
        Self {
            identity: Identity::from_route_hint(route.me.clone()),
            route,
            transcript: Transcript::new(),
            connection: ConnectionState::Disconnected,
            error: None,
            draft: String::new(),
            history_seq: 0,
            pending_history: None,
            arrived_while_loading: Vec::new(),
            scroll_epoch: 0,
        }
    }

    pub fn route(&self) -> &RouteParams {
        &self.route
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// The in-flight transcript request, if any.
    pub fn pending_history(&self) -> Option<&HistoryRequest> {
        self.pending_history.as_ref()
    }

    /// Key the transcript query uses right now.
    pub fn history_key(&self) -> HistoryKey {
        HistoryKey {
            user1: self.identity.key().to_string(),
            user2: self.route.other.clone(),
        }
    }

    /// The view became active: a connection is being opened and the first
    /// transcript load starts with the route hint.
    pub fn activated(&mut self) -> Vec<Effect> {
        self.connection = ConnectionState::Connecting;
        self.error = None;
        vec![Effect::LoadHistory(self.history_requested())]
    }

    /// Issue a new transcript request, superseding any earlier one.
    pub fn history_requested(&mut self) -> HistoryRequest {
        self.history_seq += 1;
        let request = HistoryRequest {
            seq: self.history_seq,
            key: self.history_key(),
        };
        debug!(
            "History request #{} ({} <-> {})",
            request.seq, request.key.user1, request.key.user2
        );
        self.pending_history = Some(request.clone());
        self.arrived_while_loading.clear();
        request
    }

    /// The authoritative identity lookup finished. `None` means it failed.
    ///
    /// If the id becomes known while connected, the user is joined again
    /// under it. If the query key changed, the transcript is reloaded.
    pub fn identity_resolved(&mut self, me: Option<Me>) -> Vec<Effect> {
        let before = self.history_key();
        if !self.identity.resolve(me.as_ref()) {
            return Vec::new();
        }
        debug!(
            "Identity resolved: id={:?} name={:?}",
            self.identity.id(),
            self.identity.name()
        );

        let mut effects = Vec::new();
        if self.identity.id().is_some() && self.connection == ConnectionState::Connected {
            effects.push(Effect::Emit(Directive::join(self.identity.key())));
        }
        if self.history_key() != before {
            effects.push(Effect::LoadHistory(self.history_requested()));
        }
        effects
    }

    /// A transcript response arrived.
    ///
    /// Responses to anything but the latest request, or whose key no longer
    /// matches the current query, are dropped. A failure keeps the current
    /// messages and records an error.
    pub fn history_loaded(
        &mut self,
        request: &HistoryRequest,
        result: Result<Vec<Message>, String>,
    ) -> Vec<Effect> {
        if self.pending_history.as_ref() != Some(request) || request.key != self.history_key() {
            debug!("Discarding stale history response #{}", request.seq);
            return Vec::new();
        }
        self.pending_history = None;

        let messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                warn!("History fetch failed: {}", e);
                self.error = Some(format!("History fetch failed: {}", e));
                self.arrived_while_loading.clear();
                return Vec::new();
            }
        };

        debug!("Loaded {} messages", messages.len());
        self.transcript.replace(messages);
        for message in std::mem::take(&mut self.arrived_while_loading) {
            self.transcript.append(message);
        }
        self.scroll()
    }

    /// The backend replayed a transcript over the live channel.
    pub fn history_replayed(&mut self, messages: Vec<Message>) -> Vec<Effect> {
        debug!("History replayed with {} messages", messages.len());
        self.transcript.replace(messages);
        self.scroll()
    }

    /// A live message arrived.
    pub fn message_received(&mut self, message: Message) -> Vec<Effect> {
        let tracked = self.pending_history.is_some().then(|| message.clone());
        if !self.transcript.append(message) {
            debug!("Skipping duplicate live message");
            return Vec::new();
        }
        if let Some(message) = tracked {
            self.arrived_while_loading.push(message);
        }
        self.scroll()
    }

    /// The live channel changed state.
    ///
    /// Becoming connected joins under the best known key.
    pub fn connection_changed(&mut self, connection: ConnectionState) -> Vec<Effect> {
        debug!("Connection {} -> {}", self.connection, connection);
        self.connection = connection;
        if connection == ConnectionState::Connected {
            self.error = None;
            vec![Effect::Emit(Directive::join(self.identity.key()))]
        } else {
            Vec::new()
        }
    }

    /// Route a live channel event to its transition.
    pub fn channel_event(&mut self, event: ChannelEvent) -> Vec<Effect> {
        match event {
            ChannelEvent::Connected => self.connection_changed(ConnectionState::Connected),
            ChannelEvent::Disconnected { reason } => {
                debug!("Live channel closed: {}", reason);
                self.connection_changed(ConnectionState::Disconnected)
            }
            ChannelEvent::ConnectError(e) => {
                self.error = Some(format!("Socket connect error: {}", e));
                self.connection_changed(ConnectionState::Error)
            }
            ChannelEvent::MessageHistory(messages) => self.history_replayed(messages),
            ChannelEvent::NewMessage(message) => self.message_received(message),
        }
    }

    /// The route now names a different partner.
    pub fn partner_changed(&mut self, other: impl Into<String>) -> Vec<Effect> {
        let other = other.into();
        if other == self.route.other {
            return Vec::new();
        }
        self.route.other = other;
        vec![Effect::LoadHistory(self.history_requested())]
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Validate the draft and build the send directive.
    ///
    /// The draft is kept until [`send_succeeded`](Self::send_succeeded).
    pub fn submit(&mut self) -> Result<Directive, SendRejected> {
        let body = self.draft.trim();
        if body.is_empty() {
            return Err(SendRejected::EmptyBody);
        }

        let sender = self.identity.key();
        let recipient = self.route.recipient();
        let rejected = if sender.is_empty() {
            Some(SendRejected::MissingSender)
        } else if recipient.is_empty() {
            Some(SendRejected::MissingRecipient)
        } else {
            None
        };
        if let Some(rejected) = rejected {
            self.error = Some(rejected.to_string());
            return Err(rejected);
        }

        Ok(Directive::send_message(sender, recipient, body))
    }

    pub fn send_succeeded(&mut self) {
        self.draft.clear();
    }

    pub fn send_failed(&mut self, error: &ClientError) {
        warn!("Send failed: {}", error);
        self.error = Some(format!("Send failed: {}", error));
    }

    /// The view is going away; in-flight requests no longer matter.
    pub fn deactivated(&mut self) {
        self.pending_history = None;
        self.arrived_while_loading.clear();
        self.connection = ConnectionState::Disconnected;
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let messages = self
            .transcript
            .iter()
            .map(|message| {
                let rule = ownership::classify(&self.identity, message);
                RenderedMessage {
                    message: message.clone(),
                    mine: rule.is_some(),
                    rule,
                }
            })
            .collect();

        ViewSnapshot {
            identity: self.identity.clone(),
            partner: self.route.other.clone(),
            connection: self.connection,
            messages,
            error: self.error.clone(),
            draft: self.draft.clone(),
            scroll_epoch: self.scroll_epoch,
        }
    }

    fn scroll(&mut self) -> Vec<Effect> {
        self.scroll_epoch += 1;
        vec![Effect::ScrollToLatest]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_client::{MessageId, UserRef};

    fn state(me: &str, other: &str) -> ChatState {
        ChatState::new(RouteParams::new(me, other))
    }

    fn me(id: i64, name: &str) -> Me {
        Me {
            id: Some(id),
            username: Some(name.to_string()),
            email: None,
        }
    }

    fn msg(id: i64, sender: i64, body: &str) -> Message {
        Message::new(id, UserRef::Id(sender), body)
    }

    fn load_request(effects: &[Effect]) -> HistoryRequest {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::LoadHistory(r) => Some(r.clone()),
                _ => None,
            })
            .expect("no LoadHistory effect")
    }

    #[test]
    fn activation_loads_with_route_hint() {
        let mut s = state("alice", "bob");
        let request = load_request(&s.activated());
        assert_eq!(s.connection(), ConnectionState::Connecting);
        assert_eq!(
            request.key,
            HistoryKey {
                user1: "alice".into(),
                user2: "bob".into()
            }
        );
    }

    #[test]
    fn connected_joins_with_route_hint_until_resolved() {
        let mut s = state("alice", "bob");
        s.activated();
        let effects = s.channel_event(ChannelEvent::Connected);
        assert_eq!(
            effects,
            vec![Effect::Emit(Directive::join(UserRef::Handle("alice".into())))]
        );
    }

    #[test]
    fn resolution_after_connect_rejoins_and_reloads() {
        let mut s = state("alice", "bob");
        s.activated();
        s.channel_event(ChannelEvent::Connected);

        let effects = s.identity_resolved(Some(me(1, "alice")));
        assert_eq!(effects[0], Effect::Emit(Directive::join(UserRef::Id(1))));
        assert_eq!(load_request(&effects).key.user1, "1");
    }

    #[test]
    fn resolution_before_connect_only_reloads() {
        let mut s = state("alice", "bob");
        s.activated();
        let effects = s.identity_resolved(Some(me(1, "alice")));
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::LoadHistory(_)));

        // The later connect joins with the real id.
        let effects = s.channel_event(ChannelEvent::Connected);
        assert_eq!(effects, vec![Effect::Emit(Directive::join(UserRef::Id(1)))]);
    }

    #[test]
    fn failed_resolution_changes_nothing() {
        let mut s = state("alice", "bob");
        s.activated();
        s.channel_event(ChannelEvent::Connected);
        assert!(s.identity_resolved(None).is_empty());
        assert_eq!(s.history_key().user1, "alice");
    }

    #[test]
    fn history_replaces_transcript() {
        let mut s = state("alice", "bob");
        let request = load_request(&s.activated());
        s.message_received(msg(9, 2, "early"));
        let effects = s.history_loaded(&request, Ok(vec![msg(1, 1, "hi"), msg(2, 2, "yo")]));
        assert_eq!(effects, vec![Effect::ScrollToLatest]);
        assert_eq!(s.snapshot().bodies(), ["hi", "yo", "early"]);
        assert!(s.pending_history().is_none());
    }

    #[test]
    fn live_message_already_in_history_is_not_duplicated() {
        let mut s = state("alice", "bob");
        let request = load_request(&s.activated());
        s.message_received(msg(2, 2, "yo"));
        s.history_loaded(&request, Ok(vec![msg(1, 1, "hi"), msg(2, 2, "yo")]));
        assert_eq!(s.snapshot().bodies(), ["hi", "yo"]);
    }

    #[test]
    fn history_failure_keeps_messages() {
        let mut s = state("alice", "bob");
        let first = load_request(&s.activated());
        s.history_loaded(&first, Ok(vec![msg(1, 1, "kept")]));

        let second = load_request(&s.partner_changed("carol"));
        assert!(s.history_loaded(&second, Err("500 Internal Server Error".into())).is_empty());
        assert_eq!(s.snapshot().bodies(), ["kept"]);
        assert_eq!(
            s.error(),
            Some("History fetch failed: 500 Internal Server Error")
        );
    }

    #[test]
    fn stale_history_is_discarded() {
        let mut s = state("alice", "bob");
        let to_bob = load_request(&s.activated());
        let to_carol = load_request(&s.partner_changed("carol"));

        s.history_loaded(&to_carol, Ok(vec![msg(5, 3, "carol")]));
        assert!(s.history_loaded(&to_bob, Ok(vec![msg(1, 2, "bob")])).is_empty());
        assert_eq!(s.snapshot().bodies(), ["carol"]);
    }

    #[test]
    fn stale_failure_leaves_no_error() {
        let mut s = state("alice", "bob");
        let old = load_request(&s.activated());
        s.partner_changed("carol");
        s.history_loaded(&old, Err("boom".into()));
        assert_eq!(s.error(), None);
    }

    #[test]
    fn route_hint_response_discarded_after_resolution() {
        let mut s = state("alice", "bob");
        let by_hint = load_request(&s.activated());
        let by_id = load_request(&s.identity_resolved(Some(me(1, "alice"))));

        assert!(s.history_loaded(&by_hint, Ok(vec![msg(1, 1, "hint")])).is_empty());
        s.history_loaded(&by_id, Ok(vec![msg(1, 1, "id")]));
        assert_eq!(s.snapshot().bodies(), ["id"]);
    }

    #[test]
    fn same_partner_does_not_reload() {
        let mut s = state("alice", "bob");
        s.activated();
        assert!(s.partner_changed("bob").is_empty());
    }

    #[test]
    fn live_duplicates_skipped() {
        let mut s = state("alice", "bob");
        let request = load_request(&s.activated());
        s.history_loaded(&request, Ok(vec![msg(1, 1, "hi")]));
        assert!(s.message_received(msg(1, 1, "hi")).is_empty());
        assert_eq!(s.message_received(msg(2, 2, "yo")), vec![Effect::ScrollToLatest]);
        assert_eq!(s.transcript().len(), 2);
        assert!(s.transcript().contains_id(&MessageId::Num(2)));
    }

    #[test]
    fn replay_replaces_transcript() {
        let mut s = state("alice", "bob");
        s.message_received(msg(1, 1, "old"));
        s.channel_event(ChannelEvent::MessageHistory(vec![msg(7, 2, "replayed")]));
        assert_eq!(s.snapshot().bodies(), ["replayed"]);
    }

    #[test]
    fn connect_error_sets_state_and_message() {
        let mut s = state("alice", "bob");
        s.activated();
        s.channel_event(ChannelEvent::ConnectError("refused".into()));
        assert_eq!(s.connection(), ConnectionState::Error);
        assert_eq!(s.error(), Some("Socket connect error: refused"));
    }

    #[test]
    fn disconnect_sets_state() {
        let mut s = state("alice", "bob");
        s.channel_event(ChannelEvent::Connected);
        s.channel_event(ChannelEvent::Disconnected {
            reason: "server closed".into(),
        });
        assert_eq!(s.connection(), ConnectionState::Disconnected);
    }

    #[test]
    fn whitespace_draft_is_not_sent() {
        let mut s = state("alice", "bob");
        s.set_draft("   \n\t");
        assert_eq!(s.submit(), Err(SendRejected::EmptyBody));
        assert_eq!(s.error(), None);
        assert!(s.transcript().is_empty());
    }

    #[test]
    fn submit_trims_and_coerces_recipient() {
        let mut s = state("alice", "42");
        s.set_draft("  still available?  ");
        assert_eq!(
            s.submit(),
            Ok(Directive::send_message(
                UserRef::Handle("alice".into()),
                UserRef::Id(42),
                "still available?"
            ))
        );
        // Kept until the send is confirmed.
        assert_eq!(s.draft(), "  still available?  ");
        s.send_succeeded();
        assert_eq!(s.draft(), "");
    }

    #[test]
    fn submit_uses_authoritative_id() {
        let mut s = state("alice", "bob");
        s.identity_resolved(Some(me(1, "alice")));
        s.set_draft("hi");
        match s.submit() {
            Ok(Directive::SendMessage(params)) => assert_eq!(params.sender_id, UserRef::Id(1)),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn submit_without_keys_is_rejected() {
        let mut s = state("", "bob");
        s.set_draft("hi");
        assert_eq!(s.submit(), Err(SendRejected::MissingSender));
        assert_eq!(s.error(), Some("Cannot send: missing sender or recipient id"));

        let mut s = state("alice", "");
        s.set_draft("hi");
        assert_eq!(s.submit(), Err(SendRejected::MissingRecipient));
    }

    #[test]
    fn failed_send_keeps_draft() {
        let mut s = state("alice", "bob");
        s.set_draft("hi");
        s.submit().unwrap();
        s.send_failed(&ClientError::ChannelClosed);
        assert_eq!(s.draft(), "hi");
        assert!(s.error().unwrap().starts_with("Send failed"));
    }

    #[test]
    fn snapshot_marks_ownership_with_current_identity() {
        let mut s = state("alice", "bob");
        let request = load_request(&s.activated());
        s.history_loaded(
            &request,
            Ok(vec![
                msg(1, 1, "mine by id"),
                msg(2, 2, "theirs").with_sender_username("bob"),
                Message::new(3, UserRef::Handle("alice".into()), "mine by hint"),
            ]),
        );

        let mine: Vec<bool> = s.snapshot().messages.iter().map(|m| m.mine).collect();
        assert_eq!(mine, [false, false, true]);

        s.identity_resolved(Some(me(1, "alice.s")));
        let snapshot = s.snapshot();
        let mine: Vec<bool> = snapshot.messages.iter().map(|m| m.mine).collect();
        assert_eq!(mine, [true, false, false]);
        assert_eq!(snapshot.messages[0].rule, Some(OwnershipRule::AuthoritativeId));
    }

    #[test]
    fn alice_bob_load_then_live() {
        let t0 = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap();
        let mut s = state("alice", "bob");
        let request = load_request(&s.activated());
        assert_eq!(request.key.user1, "alice");
        assert_eq!(request.key.user2, "bob");

        let hi = Message::new(1, UserRef::Handle("alice".into()), "hi").with_created_at(t0);
        s.history_loaded(&request, Ok(vec![hi.clone()]));
        assert_eq!(s.transcript().as_slice(), &[hi.clone()]);

        assert!(s.message_received(hi).is_empty());
        assert_eq!(s.transcript().len(), 1);

        let hey = Message::new(2, UserRef::Handle("bob".into()), "hey");
        s.message_received(hey);
        let snapshot = s.snapshot();
        assert_eq!(snapshot.bodies(), ["hi", "hey"]);
        assert!(snapshot.messages[0].mine);
        assert!(!snapshot.messages[1].mine);
    }

    #[test]
    fn scroll_epoch_advances_on_new_content() {
        let mut s = state("alice", "bob");
        assert_eq!(s.snapshot().scroll_epoch, 0);
        s.message_received(msg(1, 2, "a"));
        s.message_received(msg(1, 2, "a"));
        assert_eq!(s.snapshot().scroll_epoch, 1);
    }
}
