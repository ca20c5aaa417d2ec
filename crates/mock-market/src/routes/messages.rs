//! Transcript endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use market_client::SendMessageParams;
use serde::Deserialize;
use tracing::debug;

use crate::error::{MockError, Result};
use crate::state::MarketState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    user1: Option<String>,
    #[serde(default)]
    user2: Option<String>,
}

pub async fn history(
    State(state): State<MarketState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    let raw1 = query.user1.unwrap_or_default();
    let raw2 = query.user2.unwrap_or_default();

    let delay = {
        let inner = state.inner.lock().await;
        if let Some(status) = inner.behaviour.history_status {
            return Err(MockError::Injected(status));
        }
        inner.behaviour.history_delays.get(&raw2).copied()
    };
    if let Some(delay) = delay {
        debug!("Delaying history for {} by {:?}", raw2, delay);
        tokio::time::sleep(delay).await;
    }

    let inner = state.inner.lock().await;
    let (Some(u1), Some(u2)) = (inner.resolve(&raw1), inner.resolve(&raw2)) else {
        return Err(MockError::BadRequest(
            "user1 and user2 required (id or username)".to_string(),
        ));
    };

    Ok(Json(inner.conversation(u1, u2)))
}

pub async fn create(
    State(state): State<MarketState>,
    Json(params): Json<SendMessageParams>,
) -> Result<impl IntoResponse> {
    let mut inner = state.inner.lock().await;
    let body = params.body.trim().to_string();
    let sender = inner.resolve_ref(&params.sender_id);
    let recipient = inner.resolve_ref(&params.recipient_id);

    match (sender, recipient) {
        (Some(sender), Some(recipient)) if !body.is_empty() => {
            let message = inner.store(sender, recipient, body);
            Ok((StatusCode::CREATED, Json(message)))
        }
        _ => Err(MockError::BadRequest("missing fields".to_string())),
    }
}
