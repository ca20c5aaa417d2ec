//! Configuration types for market-client.

use std::env;
use std::time::Duration;

use crate::error::ClientError;

/// Default backend address used by the development server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";

/// Default path of the live channel endpoint.
pub const DEFAULT_SOCKET_PATH: &str = "/ws";

/// Default timeout for plain HTTP requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for talking to the marketplace backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend HTTP server (e.g., "http://localhost:5001").
    pub base_url: String,
    /// Path of the live channel endpoint on the same host.
    pub socket_path: String,
    /// Timeout applied to HTTP requests. The live channel has none.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the live channel path.
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        let path: String = path.into();
        self.socket_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Override the HTTP request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `MARKET_API_URL` - Backend base URL (default: http://localhost:5001)
    /// - `MARKET_SOCKET_PATH` - Live channel path (default: /ws)
    /// - `MARKET_REQUEST_TIMEOUT_SECS` - HTTP timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url =
            env::var("MARKET_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::Config(format!(
                "MARKET_API_URL must start with http:// or https://, got {}",
                base_url
            )));
        }

        let mut config = Self::new(base_url);

        if let Ok(path) = env::var("MARKET_SOCKET_PATH") {
            config = config.with_socket_path(path);
        }

        if let Ok(raw) = env::var("MARKET_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ClientError::Config(format!("invalid MARKET_REQUEST_TIMEOUT_SECS: {}", raw))
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Get the "who am I" endpoint URL.
    pub fn me_url(&self) -> String {
        format!("{}/auth/me", self.base_url)
    }

    /// Get the login endpoint URL.
    pub fn login_url(&self) -> String {
        format!("{}/auth/login", self.base_url)
    }

    /// Get the logout endpoint URL.
    pub fn logout_url(&self) -> String {
        format!("{}/auth/logout", self.base_url)
    }

    /// Get the messages collection URL (used for REST sends).
    pub fn messages_url(&self) -> String {
        format!("{}/api/messages", self.base_url)
    }

    /// Get the transcript URL for a pair of users.
    pub fn history_url(&self, user1: &str, user2: &str) -> String {
        format!(
            "{}/api/messages?user1={}&user2={}",
            self.base_url,
            urlencoding::encode(user1),
            urlencoding::encode(user2)
        )
    }

    /// Get the live channel URL, switching the scheme to ws/wss.
    pub fn socket_url(&self) -> Result<String, ClientError> {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            return Err(ClientError::Config(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        };
        Ok(format!("{}{}", ws_base, self.socket_path))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
