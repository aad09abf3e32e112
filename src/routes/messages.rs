// ============================================================================
// Messages Routes
// ============================================================================
//
// Endpoints:
// - POST /messages - Encrypt, sign, and publish a raw payload
// - GET  /messages - Consume the next envelope and verify it
//
// ============================================================================

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::RelayError;

/// POST /messages
/// Accepts the raw request body, relays it, and reports the broker-assigned
/// position once the broker has acknowledged the message.
pub async fn publish_message(
    State(app_context): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<impl IntoResponse, RelayError> {
    let result = app_context.relay.publish(&body).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "messageId": result.message_id,
            "partition": result.partition,
            "offset": result.offset,
        })),
    ))
}

/// GET /messages
/// Returns the next available envelope with its verification status, or
/// 204 No Content when the topic has nothing available within the poll
/// timeout. Unverified content is returned tagged, never dropped silently.
pub async fn consume_message(
    State(app_context): State<Arc<AppContext>>,
) -> Result<Response, RelayError> {
    match app_context.relay.consume().await? {
        Some(result) => Ok((
            StatusCode::OK,
            Json(json!({
                "payload": result.payload,
                "verification": result.verification,
                "messageId": result.message_id,
                "partition": result.partition,
                "offset": result.offset,
            })),
        )
            .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
