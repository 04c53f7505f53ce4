//! The signed webhook endpoint.
//!
//! `POST /webhook` delivers the agent's reply in the same HTTP response:
//! the handler parks on the correlator, fires `INCOMING_MESSAGE`, and
//! waits for the matching `OUTGOING_MESSAGE` or the deadline.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::debug;

use kenobot_core::{ChatId, InboundMessage, channel};
use kenobot_events::{SignalPayload, SignalType};

use crate::auth::verify_signature;
use crate::pending::PendingOutcome;
use crate::state::GatewayState;

const SIGNATURE_HEADER: &str = "x-webhook-signature";

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message, "status": "error" }))).into_response()
}

/// Handle `POST /webhook`.
pub(crate) async fn handle(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !verify_signature(&state.config.webhook_secret, &body, signature) {
        return error_response(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let Ok(parsed) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid JSON body");
    };
    let Some(message) = parsed.get("message").and_then(|m| m.as_str()) else {
        return error_response(StatusCode::BAD_REQUEST, "message is required");
    };

    // A caller-supplied chat id keeps a persistent session; otherwise the
    // conversation is transient and keeps no history.
    let chat_id = match parsed.get("chat_id").and_then(|c| c.as_str()) {
        Some(session) => ChatId::webhook(session),
        None => ChatId::transient(),
    };

    let (request_id, reply_rx) =
        match state.pending_webhook.register(chat_id.clone(), channel::WEBHOOK) {
            Ok(parked) => parked,
            Err(e) => return error_response(StatusCode::CONFLICT, &e.to_string()),
        };
    debug!(%chat_id, %request_id, "webhook request parked");

    state.bus.fire(
        SignalType::IncomingMessage,
        SignalPayload::Inbound(InboundMessage::new(
            message,
            chat_id,
            "webhook",
            channel::WEBHOOK,
        )),
        "webhook",
    );

    match tokio::time::timeout(state.config.request_timeout, reply_rx).await {
        Ok(Ok(PendingOutcome::Reply(text))) => {
            (StatusCode::OK, Json(json!({ "response": text, "status": "ok" }))).into_response()
        },
        Ok(Ok(PendingOutcome::ShuttingDown)) | Ok(Err(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "server shutting down")
        },
        Err(_elapsed) => {
            state.pending_webhook.evict(request_id);
            error_response(StatusCode::REQUEST_TIMEOUT, "timeout")
        },
    }
}
