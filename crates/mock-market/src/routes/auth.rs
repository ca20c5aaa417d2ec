//! Session endpoints.

use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{MockError, Result};
use crate::state::MarketState;

const SESSION_COOKIE: &str = "session";

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Read the user id out of the session cookie.
fn session_user(headers: &HeaderMap) -> Option<i64> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.parse().ok())
}

pub async fn login(
    State(state): State<MarketState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(MockError::BadRequest("missing credentials".to_string()));
    };

    let inner = state.inner.lock().await;
    let user = inner
        .users
        .iter()
        .find(|u| u.username == username && u.password == password)
        .ok_or_else(|| MockError::Unauthorized("invalid credentials".to_string()))?;

    info!("User {} logged in", user.username);
    let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, user.id);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({"ok": true, "msg": "login successful"})),
    ))
}

pub async fn logout() -> impl IntoResponse {
    let cookie = format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE);
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({"ok": true, "msg": "logout successful"})),
    )
}

pub async fn me(State(state): State<MarketState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    let inner = state.inner.lock().await;
    if let Some(status) = inner.behaviour.me_status {
        return Err(MockError::Injected(status));
    }

    let user = session_user(&headers).and_then(|id| inner.user(id));
    let body = match user {
        Some(user) => json!({
            "user": {"id": user.id, "username": user.username, "email": user.email}
        }),
        None => json!({"user": null}),
    };
    Ok(Json(body))
}
