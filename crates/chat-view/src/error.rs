//! Error types for chat-view.

use market_client::ClientError;
use thiserror::Error;

/// Errors surfaced by [`crate::ChatView`] and [`crate::ChatHandle`].
#[derive(Debug, Error)]
pub enum ViewError {
    /// Backend client error.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The view has been deactivated.
    #[error("view is no longer active")]
    Closed,
}

/// Reasons a submit is rejected locally, before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendRejected {
    /// Draft is empty after trimming.
    #[error("nothing to send")]
    EmptyBody,

    /// Neither an authoritative id nor a route hint is available.
    #[error("Cannot send: missing sender or recipient id")]
    MissingSender,

    /// The route names no conversation partner.
    #[error("Cannot send: missing sender or recipient id")]
    MissingRecipient,
}
