//! HTTP-facing error type for the chat relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::fmt;

/// Errors surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    /// The caller's input failed validation before any work started.
    BadRequest { message: String },
    /// A downstream service the response depends on failed.
    UpstreamUnavailable { message: String },
    /// Session storage failed where the request cannot proceed.
    Storage { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { message } => write!(f, "bad request: {message}"),
            Self::UpstreamUnavailable { message } => write!(f, "upstream unavailable: {message}"),
            Self::Storage { message } => write!(f, "storage error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<jal_mittar_conversation::StoreError> for ApiError {
    fn from(err: jal_mittar_conversation::StoreError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            Self::UpstreamUnavailable { message } => (StatusCode::BAD_GATEWAY, message),
            Self::Storage { message } => {
                tracing::error!(error = %message, "storage failure serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
