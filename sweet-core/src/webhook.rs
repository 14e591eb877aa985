use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::payment::PaymentIntentStatus;
use crate::{CoreError, CoreResult};

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";
pub const PAYMENT_INTENT_CANCELED: &str = "payment_intent.canceled";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix seconds, set by the provider when the event was created.
    #[serde(default)]
    pub created: Option<i64>,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    pub status: Option<PaymentIntentStatus>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PaymentSucceeded,
    PaymentFailed,
    PaymentCanceled,
    Other(String),
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| CoreError::ValidationError(format!("invalid webhook payload: {}", e)))
    }

    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            PAYMENT_INTENT_SUCCEEDED => EventKind::PaymentSucceeded,
            PAYMENT_INTENT_FAILED => EventKind::PaymentFailed,
            PAYMENT_INTENT_CANCELED => EventKind::PaymentCanceled,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn payment_intent(&self) -> CoreResult<PaymentIntentObject> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            CoreError::ValidationError(format!(
                "event {} does not carry a payment intent: {}",
                self.id, e
            ))
        })
    }

    /// Event creation time, falling back to now when the provider omits it.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.created
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now)
    }
}
