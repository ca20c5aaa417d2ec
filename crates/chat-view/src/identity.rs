//! Local user identity: route hint plus the authoritative lookup.

use market_client::{Me, UserRef};
use tracing::debug;

/// Who the local user is, as far as the view knows.
///
/// Starts from the route hint alone. The first call to
/// [`resolve`](Self::resolve) fixes the authoritative id and name; later calls
/// are ignored. The route hint never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: Option<i64>,
    name: Option<String>,
    route_hint: String,
    resolved: bool,
}

impl Identity {
    /// Identity known only by its route hint.
    pub fn from_route_hint(route_hint: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            route_hint: route_hint.into(),
            resolved: false,
        }
    }

    /// Authoritative numeric id.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Authoritative username.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn route_hint(&self) -> &str {
        &self.route_hint
    }

    /// Whether the authoritative lookup has completed (successfully or not).
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Apply the result of the authoritative lookup.
    ///
    /// `None` means the lookup failed; the identity keeps using the route
    /// hint. Returns true if the id or name changed.
    pub fn resolve(&mut self, me: Option<&Me>) -> bool {
        if self.resolved {
            debug!("Identity already resolved, ignoring lookup result");
            return false;
        }
        self.resolved = true;

        let Some(me) = me else {
            return false;
        };
        let before = (self.id, self.name.clone());
        self.id = me.id.or(self.id);
        self.name = me.username.clone().or(self.name.take());
        before != (self.id, self.name.clone())
    }

    /// Key for joins, sends and history queries: the authoritative id if
    /// known, else the route hint.
    pub fn key(&self) -> UserRef {
        match self.id {
            Some(id) => UserRef::Id(id),
            None => UserRef::Handle(self.route_hint.clone()),
        }
    }

    /// Name to show for the local user.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.route_hint)
    }
}
