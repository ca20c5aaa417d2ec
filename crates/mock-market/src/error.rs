//! Error responses of the fake backend.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors returned by the fake backend's handlers.
#[derive(Debug, Error)]
pub enum MockError {
    /// Missing or unusable request fields.
    #[error("{0}")]
    BadRequest(String),

    /// Wrong or missing credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// A failure injected by the test.
    #[error("injected failure")]
    Injected(StatusCode),
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let status = match &self {
            MockError::BadRequest(_) => StatusCode::BAD_REQUEST,
            MockError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MockError::Injected(status) => *status,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, MockError>;
