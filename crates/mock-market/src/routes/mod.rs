//! Route handlers of the fake backend.

pub mod auth;
pub mod messages;
pub mod socket;

use axum::routing::{get, post};
use axum::Router;

use crate::state::MarketState;

/// Build the router with all routes.
pub fn router(socket_path: &str) -> Router<MarketState> {
    Router::new()
        .route("/", get(|| async { "Backend is running" }))
        // Session
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Transcript
        .route(
            "/api/messages",
            get(messages::history).post(messages::create),
        )
        // Live channel
        .route(socket_path, get(socket::upgrade))
}
