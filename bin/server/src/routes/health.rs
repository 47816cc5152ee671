//! Liveness probe.

use axum::response::Json;
use serde_json::Value as JsonValue;

pub async fn health() -> Json<JsonValue> {
    Json(serde_json::json!({ "ok": true }))
}
