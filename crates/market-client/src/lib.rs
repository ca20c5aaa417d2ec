//! Marketplace backend client library.
//!
//! This crate provides a Rust client for the marketplace backend. It supports:
//!
//! - Session login/logout and the credentialed "who am I" lookup
//! - Fetching the transcript between two users
//! - The live chat channel: joining, sending, and receiving history replays
//!   and new messages as a stream of [`ChannelEvent`]s
//!
//! # Example
//!
//! ```no_run
//! use market_client::{ChannelEvent, ClientConfig, Directive, MarketClient, UserRef};
//!
//! # async fn example() -> Result<(), market_client::ClientError> {
//! let client = MarketClient::new(ClientConfig::default())?;
//! client.login("alice", "hunter2").await?;
//!
//! let me = client.me().await?;
//! let history = client.history("alice", "bob").await?;
//! println!("{:?} has {} messages with bob", me.username, history.len());
//!
//! let mut channel = client.open_channel()?;
//! while let Some(event) = channel.next_event().await {
//!     match event {
//!         ChannelEvent::Connected => {
//!             channel.emit(&Directive::join(UserRef::from("alice")))?;
//!         }
//!         ChannelEvent::NewMessage(msg) => println!("{}: {}", msg.sender_id.unwrap(), msg.body),
//!         other => println!("{:?}", other),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use channel::LiveChannel;
pub use client::MarketClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use types::*;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
