//! Marketplace backend HTTP client.

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channel::LiveChannel;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::types::{AuthAck, HistoryResponse, LoginRequest, Me, Message, SendMessageParams};

/// Client for the marketplace backend.
///
/// Holds a cookie store, so a successful [`login`](Self::login) makes every
/// later call on this client (and its clones) credentialed.
#[derive(Clone)]
pub struct MarketClient {
    http: Client,
    config: ClientConfig,
}

impl MarketClient {
    /// Create a client for the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self { http, config })
    }

    /// Log in with username and password, storing the session cookie.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let url = self.config.login_url();
        debug!("Login: {} as {}", url, username);

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(ClientError::Http)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthenticated);
        }
        let ack: AuthAck = check_status(response).await?.json().await?;
        if !ack.ok {
            return Err(ClientError::Status {
                status: 200,
                body: ack.error.unwrap_or_else(|| "login rejected".to_string()),
            });
        }

        info!("Logged in as {}", username);
        Ok(())
    }

    /// End the current session.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let url = self.config.logout_url();
        debug!("Logout: {}", url);

        let response = self.http.post(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Look up the user behind the current session.
    ///
    /// Returns [`ClientError::Unauthenticated`] on 401/403 and when the
    /// backend answers successfully but names no user.
    pub async fn me(&self) -> Result<Me, ClientError> {
        let url = self.config.me_url();
        debug!("Identity lookup: {}", url);

        let response = self.http.get(&url).send().await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(ClientError::Unauthenticated);
        }

        let body: Value = check_status(response).await?.json().await?;
        Me::from_body(body).ok_or(ClientError::Unauthenticated)
    }

    /// Fetch the ordered transcript between two users.
    ///
    /// Each side may be a numeric id or a username.
    pub async fn history(&self, user1: &str, user2: &str) -> Result<Vec<Message>, ClientError> {
        let url = self.config.history_url(user1, user2);
        debug!("History fetch: {}", url);

        let response = self.http.get(&url).send().await?;
        let body: HistoryResponse = check_status(response).await?.json().await?;
        let messages = body.into_messages();

        debug!("History {}<->{}: {} messages", user1, user2, messages.len());
        Ok(messages)
    }

    /// Store a message over plain HTTP and return it as saved.
    ///
    /// Delivery to connected peers is up to the backend; the live channel
    /// path ([`crate::Directive::SendMessage`]) is the usual way to send.
    pub async fn post_message(&self, params: &SendMessageParams) -> Result<Message, ClientError> {
        let url = self.config.messages_url();
        debug!(
            "Posting message {} -> {} ({} bytes)",
            params.sender_id,
            params.recipient_id,
            params.body.len()
        );

        let response = self.http.post(&url).json(params).send().await?;
        let message: Message = check_status(response).await?.json().await?;
        Ok(message)
    }

    /// Open the live channel. The connection is established in the background
    /// and reported through the channel's event stream.
    pub fn open_channel(&self) -> Result<LiveChannel, ClientError> {
        let url = self.config.socket_url()?;
        Ok(LiveChannel::open(url))
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the underlying HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http
    }
}

/// Turn a non-success response into [`ClientError::Status`].
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Backend returned HTTP {}: {}", status, body);
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

impl std::fmt::Debug for MarketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketClient")
            .field("config", &self.config)
            .finish()
    }
}
