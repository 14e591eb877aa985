use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sweet_core::CoreError;
use sweet_order::{MockPaymentError, MockPaymentRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/confirm", post(confirm_payment))
        .route("/v1/payments/intents", post(create_payment_intent))
        .route("/v1/payments/mock", post(mock_payment))
}

fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::ValidationError(format!("Invalid request body: {}", rejection.body_text()))
}

/// POST /v1/payments/confirm
/// Mirrors the processor's current intent status onto the order.
pub async fn confirm_payment(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmPaymentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload.map_err(bad_body)?;
    let intent_id = req
        .payment_intent_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("paymentIntentId is required".to_string()))?;

    let orchestrator = state
        .payments
        .as_ref()
        .ok_or_else(|| AppError::ConfirmationFailed("Payment processing is not configured".to_string()))?;

    let confirmation = orchestrator
        .confirm_payment(&intent_id)
        .await
        .map_err(|e| match e {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            other => AppError::ConfirmationFailed(other.to_string()),
        })?;

    Ok(Json(json!({ "data": confirmation })))
}

/// POST /v1/payments/intents
/// Creates a processor intent for an existing order.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    payload: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload.map_err(bad_body)?;
    let orchestrator = state
        .payments
        .as_ref()
        .ok_or_else(|| AppError::ConfigurationError("Payment processing is not configured".to_string()))?;

    let intent = orchestrator.initialize_payment(req.order_id).await?;

    let response = PaymentIntentResponse {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
    };
    Ok(Json(json!({ "data": response })))
}

/// POST /v1/payments/mock
/// Simulated checkout for environments without a processor.
pub async fn mock_payment(
    State(state): State<AppState>,
    payload: Result<Json<MockPaymentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload.map_err(bad_body)?;

    match state.mock_payments.process(&req).await {
        Ok(receipt) => Ok(Json(json!({ "data": receipt }))),
        Err(MockPaymentError::Invalid(details)) => Err(AppError::UnprocessableEntity {
            message: "Invalid payment request".to_string(),
            details,
        }),
        Err(MockPaymentError::Declined(message)) => Err(AppError::PaymentDeclined(message)),
    }
}
