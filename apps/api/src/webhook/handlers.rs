use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;
use crate::webhook::pipeline::ingest;

pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// POST /api/vapi/webhook
///
/// Acknowledges every delivery with `{"ok": true}`; the only rejection is a
/// shared-secret mismatch.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(expected) = state.config.webhook_token.as_deref() {
        let got = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if got != Some(expected) {
            warn!("Rejected webhook delivery with a bad or missing token");
            return Err(AppError::Unauthorized);
        }
    }

    let payload = parse_payload(&body);
    ingest(
        state.store.as_ref(),
        state.classifier.as_ref(),
        payload,
        Utc::now(),
    )
    .await;

    Ok(Json(json!({ "ok": true })))
}

/// GET /api/vapi/webhook
pub async fn handle_webhook_probe() -> Json<Value> {
    Json(json!({ "ok": true, "route": "/api/vapi/webhook" }))
}

/// Unparsable bodies are treated as an empty event.
fn parse_payload(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_tolerates_garbage() {
        assert_eq!(parse_payload(b"not json"), json!({}));
        assert_eq!(parse_payload(b""), json!({}));
        assert_eq!(parse_payload(b"[1,2]"), json!([1, 2]));
        assert_eq!(parse_payload(br#"{"type":"x"}"#), json!({"type": "x"}));
    }
}
