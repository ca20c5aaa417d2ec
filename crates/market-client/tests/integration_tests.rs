//! Integration tests for market-client.
//!
//! Most tests run without a backend. Tests that need the real marketplace
//! backend are ignored and read:
//!   MARKET_API_URL       - backend base URL
//!   MARKET_USERNAME      - account to log in with
//!   MARKET_PASSWORD      - its password
//!   MARKET_PARTNER       - conversation partner (username or id)
//!
//! Run ignored tests:
//!   cargo test --test integration_tests -- --ignored

use market_client::{ChannelEvent, ClientConfig, ClientError, Directive, MarketClient, UserRef};
use std::env;
use std::time::Duration;

fn backend_config() -> ClientConfig {
    let _ = dotenvy::dotenv();
    ClientConfig::from_env().expect("valid MARKET_* environment")
}

// ============================================================================
// Unit tests (no backend required)
// ============================================================================

mod config_tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5001");
        assert_eq!(config.socket_path, "/ws");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_client_config_urls() {
        let config = ClientConfig::new("http://localhost:5001");
        assert_eq!(config.me_url(), "http://localhost:5001/auth/me");
        assert_eq!(config.login_url(), "http://localhost:5001/auth/login");
        assert_eq!(config.logout_url(), "http://localhost:5001/auth/logout");
        assert_eq!(config.messages_url(), "http://localhost:5001/api/messages");
        assert_eq!(config.socket_url().unwrap(), "ws://localhost:5001/ws");
    }

    #[test]
    fn test_history_url_encodes_params() {
        let config = ClientConfig::new("http://localhost:5001");
        assert_eq!(
            config.history_url("john.doe", "a b&c"),
            "http://localhost:5001/api/messages?user1=john.doe&user2=a%20b%26c"
        );
    }

    #[test]
    fn test_custom_socket_path() {
        let config = ClientConfig::new("http://127.0.0.1:9000").with_socket_path("/socket");
        assert_eq!(config.socket_url().unwrap(), "ws://127.0.0.1:9000/socket");
    }
}

mod directive_tests {
    use super::*;
    use market_client::Frame;

    #[test]
    fn test_directive_roundtrip_through_frame_text() {
        let directive = Directive::send_message(UserRef::Id(1), UserRef::from("bob"), "hello");
        let text = directive.to_frame().unwrap().encode().unwrap();
        let decoded = Directive::from_frame(Frame::parse(&text).unwrap()).unwrap();
        assert_eq!(decoded, Some(directive));
    }
}

// ============================================================================
// Offline failure behaviour
// ============================================================================

mod offline_tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_me_without_backend_is_http_error() {
        let client = MarketClient::new(ClientConfig::new("http://127.0.0.1:59999")).unwrap();
        match client.me().await {
            Err(ClientError::Http(_)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_channel_without_backend_reports_connect_error() {
        let client = MarketClient::new(ClientConfig::new("http://127.0.0.1:59999")).unwrap();
        let mut channel = client.open_channel().unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), channel.next_event())
            .await
            .expect("connect attempt should finish");
        match first {
            Some(ChannelEvent::ConnectError(reason)) => {
                assert!(reason.starts_with("WebSocket error:"), "{}", reason)
            }
            other => panic!("Unexpected event: {:?}", other),
        }

        // The stream ends after the lifecycle event.
        assert_eq!(channel.next().await, None);
        assert!(matches!(
            channel.emit(&Directive::join(UserRef::Id(1))),
            Err(ClientError::ChannelClosed)
        ));
    }
}

// ============================================================================
// Backend tests (require a running marketplace backend)
// ============================================================================

mod backend_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires running backend and MARKET_USERNAME/MARKET_PASSWORD"]
    async fn test_login_and_me() {
        let username = env::var("MARKET_USERNAME").expect("MARKET_USERNAME not set");
        let password = env::var("MARKET_PASSWORD").expect("MARKET_PASSWORD not set");

        let client = MarketClient::new(backend_config()).unwrap();
        client.login(&username, &password).await.unwrap();

        let me = client.me().await.unwrap();
        assert_eq!(me.username.as_deref(), Some(username.as_str()));
    }

    #[tokio::test]
    #[ignore = "requires running backend and MARKET_USERNAME/MARKET_PARTNER"]
    async fn test_history() {
        let username = env::var("MARKET_USERNAME").expect("MARKET_USERNAME not set");
        let partner = env::var("MARKET_PARTNER").expect("MARKET_PARTNER not set");

        let client = MarketClient::new(backend_config()).unwrap();
        let messages = client.history(&username, &partner).await.unwrap();
        println!("{} messages between {} and {}", messages.len(), username, partner);
    }

    #[tokio::test]
    #[ignore = "requires running backend"]
    async fn test_channel_connects() {
        let client = MarketClient::new(backend_config()).unwrap();
        let mut channel = client.open_channel().unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), channel.next_event())
            .await
            .expect("no lifecycle event");
        assert_eq!(first, Some(ChannelEvent::Connected));
        channel.close();
    }
}
