//! Fake marketplace backend for testing the chat client.
//!
//! [`MockMarket`] serves the endpoints the client consumes on a random
//! local port:
//!
//! - `POST /auth/login`, `POST /auth/logout`, `GET /auth/me` (cookie session)
//! - `GET /api/messages?user1=&user2=`, `POST /api/messages`
//! - the live channel (`join`, `send_message` in; `message_history`,
//!   `new_message` out)
//!
//! Failures and latency can be injected per test.
//!
//! # Example
//!
//! ```rust
//! use mock_market::MockMarket;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let market = MockMarket::builder()
//!         .user(1, "alice", "pw")
//!         .user(2, "bob", "pw")
//!         .spawn()
//!         .await?;
//!
//!     let client = market.client();
//!     let history = client.history("alice", "bob").await.unwrap();
//!     assert!(history.is_empty());
//!     Ok(())
//! }
//! ```

mod error;
mod routes;
mod state;

use std::time::Duration;

use market_client::{
    ChannelEvent, ClientConfig, Directive, MarketClient, Message, UserRef,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

pub use axum::http::StatusCode;
pub use error::MockError;
pub use state::{MarketState, MockUser};

use crate::state::Behaviour;

/// Builder for [`MockMarket`].
#[derive(Debug, Clone, Default)]
pub struct MockMarketBuilder {
    users: Vec<MockUser>,
    messages: Vec<Message>,
    behaviour: Behaviour,
    socket_path: Option<String>,
}

impl MockMarketBuilder {
    /// Register an account.
    pub fn user(mut self, id: i64, username: &str, password: &str) -> Self {
        self.users.push(MockUser {
            id,
            username: username.to_string(),
            password: password.to_string(),
            email: format!("{}@example.edu", username),
        });
        self
    }

    /// Seed a stored message from `sender` to `recipient` (user ids).
    pub fn message(mut self, id: i64, sender: i64, recipient: i64, body: &str) -> Self {
        self.messages.push(
            Message::new(id, UserRef::Id(sender), body)
                .with_recipient(UserRef::Id(recipient))
                .with_created_at(chrono::Utc::now().naive_utc()),
        );
        self
    }

    /// Answer `GET /auth/me` with the given status.
    pub fn reject_identity_lookup(mut self, status: StatusCode) -> Self {
        self.behaviour.me_status = Some(status);
        self
    }

    /// Answer `GET /api/messages` with the given status.
    pub fn fail_history(mut self, status: StatusCode) -> Self {
        self.behaviour.history_status = Some(status);
        self
    }

    /// Delay transcript responses whose `user2` equals `partner`.
    pub fn history_delay(mut self, partner: &str, delay: Duration) -> Self {
        self.behaviour
            .history_delays
            .insert(partner.to_string(), delay);
        self
    }

    /// Reply to `join` with a `message_history` of the joined user's messages.
    pub fn replay_history_on_join(mut self) -> Self {
        self.behaviour.replay_history_on_join = true;
        self
    }

    /// Serve the live channel on a different path.
    pub fn socket_path(mut self, path: &str) -> Self {
        self.socket_path = Some(path.to_string());
        self
    }

    /// Bind to a random local port and start serving.
    pub async fn spawn(self) -> std::io::Result<MockMarket> {
        let socket_path = self
            .socket_path
            .unwrap_or_else(|| market_client::config::DEFAULT_SOCKET_PATH.to_string());
        let state = MarketState::new(self.users, self.messages, self.behaviour);
        let app = routes::router(&socket_path).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        info!("Mock market listening on {}", addr);
        Ok(MockMarket {
            config: ClientConfig::new(format!("http://{}", addr)).with_socket_path(socket_path),
            state,
            task,
        })
    }
}

/// A running fake backend. Stops serving when dropped.
pub struct MockMarket {
    config: ClientConfig,
    state: MarketState,
    task: JoinHandle<()>,
}

impl MockMarket {
    /// Start building a fake backend.
    pub fn builder() -> MockMarketBuilder {
        MockMarketBuilder::default()
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Client configuration pointing at this backend.
    pub fn config(&self) -> ClientConfig {
        self.config.clone()
    }

    /// A fresh client (with its own cookie jar) for this backend.
    pub fn client(&self) -> MarketClient {
        // Building a reqwest client only fails on TLS backend init, which a
        // plain-http test client never touches.
        MarketClient::new(self.config()).expect("build test client")
    }

    /// Store a message and deliver it as `new_message` to every socket.
    pub async fn deliver(&self, sender: i64, recipient: i64, body: &str) -> Message {
        let message = {
            let mut inner = self.state.inner.lock().await;
            inner.store(sender, recipient, body.to_string())
        };
        self.state
            .broadcast(ChannelEvent::NewMessage(message.clone()));
        message
    }

    /// Deliver an arbitrary event to every socket without storing anything.
    pub fn broadcast(&self, event: ChannelEvent) {
        self.state.broadcast(event);
    }

    /// Every stored message, in insertion order.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.inner.lock().await.messages.clone()
    }

    /// Every directive received over the live channel, in arrival order.
    pub async fn received(&self) -> Vec<Directive> {
        self.state.inner.lock().await.received.clone()
    }

    /// Change the latency of transcript responses for `partner`.
    pub async fn set_history_delay(&self, partner: &str, delay: Option<Duration>) {
        let mut inner = self.state.inner.lock().await;
        match delay {
            Some(delay) => {
                inner
                    .behaviour
                    .history_delays
                    .insert(partner.to_string(), delay);
            }
            None => {
                inner.behaviour.history_delays.remove(partner);
            }
        }
    }

    /// Number of sockets currently connected.
    pub fn connected_sockets(&self) -> usize {
        self.state.events.receiver_count()
    }
}

impl Drop for MockMarket {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_client::{ClientError, MessageId};

    async fn market() -> MockMarket {
        MockMarket::builder()
            .user(1, "alice", "pw-a")
            .user(2, "bob", "pw-b")
            .message(1, 1, 2, "is the bike still for sale?")
            .message(2, 2, 1, "yes")
            .spawn()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn history_resolves_usernames_and_ids() {
        let market = market().await;
        let client = market.client();

        let by_name = client.history("alice", "bob").await.unwrap();
        let by_id = client.history("1", "2").await.unwrap();
        assert_eq!(by_name.len(), 2);
        assert_eq!(by_name, by_id);
        assert_eq!(by_name[0].body, "is the bike still for sale?");
    }

    #[tokio::test]
    async fn unknown_user_is_bad_request() {
        let market = market().await;
        match market.client().history("alice", "nobody").await {
            Err(ClientError::Status { status: 400, .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_makes_me_resolve() {
        let market = market().await;
        let client = market.client();

        assert!(matches!(client.me().await, Err(ClientError::Unauthenticated)));
        client.login("bob", "pw-b").await.unwrap();
        let me = client.me().await.unwrap();
        assert_eq!(me.id, Some(2));
        assert_eq!(me.username.as_deref(), Some("bob"));

        client.logout().await.unwrap();
        assert!(matches!(client.me().await, Err(ClientError::Unauthenticated)));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthenticated() {
        let market = market().await;
        assert!(matches!(
            market.client().login("bob", "nope").await,
            Err(ClientError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn post_message_stores() {
        let market = market().await;
        let params = market_client::SendMessageParams {
            sender_id: UserRef::from("alice"),
            recipient_id: UserRef::Id(2),
            body: "  can you do $80?  ".to_string(),
        };
        let stored = market.client().post_message(&params).await.unwrap();
        assert_eq!(stored.id, Some(MessageId::Num(3)));
        assert_eq!(stored.sender_id, Some(UserRef::Id(1)));
        assert_eq!(stored.body, "can you do $80?");
        assert_eq!(market.messages().await.len(), 3);
    }
}
