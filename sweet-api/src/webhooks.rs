use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use sweet_core::webhook::WebhookEvent;
use sweet_order::WebhookOutcome;

use crate::error::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/stripe", post(handle_stripe_webhook))
}

fn reject(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "message": message.into() } })),
    )
        .into_response()
}

/// POST /v1/webhooks/stripe
/// Verifies, parses and applies a processor event.
pub async fn handle_stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let (Some(verifier), Some(processor)) = (state.signature.as_ref(), state.webhooks.as_ref()) else {
        return AppError::ConfigurationError("Webhook processing is not configured".to_string()).into_response();
    };

    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok()) else {
        tracing::warn!("Webhook rejected: missing {} header", SIGNATURE_HEADER);
        return reject("Missing stripe-signature header");
    };

    // Verified against the raw bytes, before any parsing.
    if let Err(e) = verifier.verify(&body, signature) {
        tracing::warn!("Webhook rejected: {}", e);
        return reject(format!("Webhook signature verification failed: {}", e));
    }

    let event = match WebhookEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Webhook rejected: {}", e);
            return reject(e.to_string());
        }
    };
    tracing::info!("Received webhook {} ({})", event.id, event.event_type);

    // Detached so a dropped connection cannot stop processing half-way.
    let processor = processor.clone();
    let event_id = event.id.clone();
    let processed = tokio::spawn(async move { processor.process(&event).await }).await;
    let processed = match processed {
        Ok(processed) => processed,
        Err(e) => {
            tracing::error!("Webhook {} task failed: {}", event_id, e);
            return reject("Webhook processing was interrupted");
        }
    };

    match processed {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::Applied { order, release: Some(report) }
                | WebhookOutcome::Stale { order, release: Some(report) }
                    if !report.is_complete() =>
                {
                    tracing::warn!(
                        "Order {}: {} inventory releases failed",
                        order.order_number,
                        report.failed.len()
                    );
                }
                other => tracing::debug!("Webhook {} outcome: {:?}", event_id, other),
            }
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(e) => {
            if e.is_client_error() {
                tracing::warn!("Webhook {} rejected: {}", event_id, e);
            } else {
                tracing::error!("Webhook {} failed: {}", event_id, e);
            }
            reject(e.to_string())
        }
    }
}
