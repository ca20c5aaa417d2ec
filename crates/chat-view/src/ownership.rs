//! Decides whether a message was sent by the local user.

use market_client::Message;

use crate::identity::Identity;

/// One rule of the ownership cascade.
///
/// Rules are tried in [`CASCADE`](Self::CASCADE) order and the first match
/// wins. The route hint keeps counting for usernames after the lookup
/// resolves; for sender ids it only counts while no authoritative id is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipRule {
    /// Sender id equals the authoritative id, compared as text.
    /// The loose match is intentional: a `"42"` handle counts as id 42.
    AuthoritativeId,
    /// Sender username equals the authoritative name.
    AuthoritativeName,
    /// Sender username equals the route hint.
    UsernameMatchesRouteHint,
    /// No authoritative id; sender id, as text, equals the route hint.
    SenderKeyMatchesRouteHint,
}

impl OwnershipRule {
    pub const CASCADE: [OwnershipRule; 4] = [
        OwnershipRule::AuthoritativeId,
        OwnershipRule::AuthoritativeName,
        OwnershipRule::UsernameMatchesRouteHint,
        OwnershipRule::SenderKeyMatchesRouteHint,
    ];

    pub fn matches(self, identity: &Identity, message: &Message) -> bool {
        let username = message.sender_username.as_deref().filter(|u| !u.is_empty());
        match self {
            OwnershipRule::AuthoritativeId => match (identity.id(), &message.sender_id) {
                (Some(id), Some(sender)) => sender.to_string() == id.to_string(),
                _ => false,
            },
            OwnershipRule::AuthoritativeName => match (identity.name(), username) {
                (Some(name), Some(username)) => name == username,
                _ => false,
            },
            OwnershipRule::UsernameMatchesRouteHint => {
                username == Some(identity.route_hint())
            }
            OwnershipRule::SenderKeyMatchesRouteHint => {
                identity.id().is_none()
                    && message
                        .sender_id
                        .as_ref()
                        .is_some_and(|sender| sender.to_string() == identity.route_hint())
            }
        }
    }
}

/// The first rule that claims `message` for `identity`, if any.
pub fn classify(identity: &Identity, message: &Message) -> Option<OwnershipRule> {
    OwnershipRule::CASCADE
        .into_iter()
        .find(|rule| rule.matches(identity, message))
}

pub fn is_mine(identity: &Identity, message: &Message) -> bool {
    classify(identity, message).is_some()
}
