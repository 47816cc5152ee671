//! Certificate download passthrough.
//!
//! Streams the e-district PDF through to the caller without buffering
//! the whole document.

use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(application_number): Path<String>,
) -> Response {
    let upstream = match state.certificates.fetch(&application_number).await {
        Ok(upstream) => upstream,
        Err(err) => {
            tracing::warn!(error = %err, application_number, "certificate passthrough failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "Failed to download certificate" })),
            )
                .into_response();
        }
    };

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/pdf")
        .to_string();

    let body = Body::from_stream(upstream.bytes_stream());
    (
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=certificate-{application_number}.pdf"),
            ),
        ],
        body,
    )
        .into_response()
}
