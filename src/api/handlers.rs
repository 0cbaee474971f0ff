//! HTTP request handlers

use super::types::{HealthResponse, VerifyParams, WebhookPayload};
use super::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Channel webhook: handshake and notifications
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let expected = state.verify_token.as_deref().filter(|t| !t.is_empty());
    let verified = params.mode.as_deref() == Some("subscribe")
        && expected.is_some()
        && params.verify_token.as_deref() == expected;

    if verified {
        tracing::info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        tracing::warn!(mode = ?params.mode, "Webhook verification failed");
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Always answers 200 so the channel does not retry
async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Malformed webhook payload");
            return StatusCode::OK;
        }
    };

    let batches = payload.batches_by_sender();
    if batches.is_empty() {
        tracing::debug!(object = ?payload.object, "Webhook without text messages");
    }

    // One task per sender keeps that sender's messages in order
    for batch in batches {
        let runtime = state.runtime.clone();
        tokio::spawn(async move {
            for message in batch {
                runtime.handle(message).await;
            }
        });
    }

    StatusCode::OK
}

// ============================================================
// Probes
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_version() -> &'static str {
    concat!("ohibot ", env!("CARGO_PKG_VERSION"))
}
