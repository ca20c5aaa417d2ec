//! Route parameters that open a conversation.

use market_client::UserRef;

/// The two identifiers navigation supplies to the view.
///
/// Either may be a username or a numeric id carried as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    /// Hint for the local user.
    pub me: String,
    /// Conversation partner.
    pub other: String,
}

impl RouteParams {
    pub fn new(me: impl Into<String>, other: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            other: other.into(),
        }
    }

    /// Recipient key for outgoing messages; pure-digit partners become ids.
    pub fn recipient(&self) -> UserRef {
        UserRef::coerce(&self.other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_partner_is_coerced() {
        assert_eq!(RouteParams::new("alice", "17").recipient(), UserRef::Id(17));
        assert_eq!(
            RouteParams::new("alice", "bob").recipient(),
            UserRef::Handle("bob".into())
        );
    }
}
