//! Headless conversation view for the marketplace chat.
//!
//! A view shows the transcript between the local user and one partner and
//! keeps it live:
//!
//! - resolves who the local user is, falling back to the route hint
//! - loads the stored transcript, discarding responses that are no longer
//!   relevant
//! - joins the live channel and appends incoming messages without
//!   duplicates
//! - marks each message as mine or theirs
//! - sends the draft as a `send_message` directive
//!
//! [`ChatState`] holds the pure state machine; [`ChatView`] drives it
//! against a [`market_client::MarketClient`].
//!
//! # Example
//!
//! ```no_run
//! use chat_view::{ChatView, RouteParams};
//! use market_client::{ClientConfig, MarketClient};
//!
//! # async fn example() -> Result<(), chat_view::ViewError> {
//! let client = MarketClient::new(ClientConfig::from_env()?)?;
//! let mut view = ChatView::new(client, RouteParams::new("alice", "bob")).activate()?;
//!
//! view.send("is the bike still for sale?")?;
//! let snapshot = view.wait_for(|s| s.draft.is_empty()).await?;
//! for m in &snapshot.messages {
//!     println!("{} {}", if m.mine { ">" } else { "<" }, m.message.body);
//! }
//! view.deactivate().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identity;
pub mod ownership;
pub mod route;
pub mod state;
pub mod transcript;
pub mod view;

pub use error::{SendRejected, ViewError};
pub use identity::Identity;
pub use ownership::{classify, is_mine, OwnershipRule};
pub use route::RouteParams;
pub use state::{
    ChatState, ConnectionState, Effect, HistoryKey, HistoryRequest, RenderedMessage, ViewSnapshot,
};
pub use transcript::Transcript;
pub use view::{ChatHandle, ChatView, ViewCommand};
