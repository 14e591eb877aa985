use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::CoreResult;

/// Processor-side status of a payment intent.
///
/// Unrecognised values are kept verbatim in `Other` so the raw status can
/// be echoed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    PaymentFailed,
    Canceled,
    Other(String),
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentIntentStatus::RequiresAction => "requires_action",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::PaymentFailed => "payment_failed",
            PaymentIntentStatus::Canceled => "canceled",
            PaymentIntentStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for PaymentIntentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "requires_payment_method" => PaymentIntentStatus::RequiresPaymentMethod,
            "requires_confirmation" => PaymentIntentStatus::RequiresConfirmation,
            "requires_action" => PaymentIntentStatus::RequiresAction,
            "processing" => PaymentIntentStatus::Processing,
            "succeeded" => PaymentIntentStatus::Succeeded,
            "payment_failed" => PaymentIntentStatus::PaymentFailed,
            "canceled" => PaymentIntentStatus::Canceled,
            _ => PaymentIntentStatus::Other(raw),
        }
    }
}

impl From<&str> for PaymentIntentStatus {
    fn from(raw: &str) -> Self {
        PaymentIntentStatus::from(raw.to_string())
    }
}

impl From<PaymentIntentStatus> for String {
    fn from(status: PaymentIntentStatus) -> Self {
        match status {
            PaymentIntentStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., pi_123)
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Unix seconds.
    pub created: Option<i64>,
}

/// Parameters for a new intent.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: i64,
    pub currency: String,
    pub receipt_email: Option<String>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a payment intent with the provider
    async fn create_intent(&self, request: &NewPaymentIntent) -> CoreResult<PaymentIntent>;

    /// Retrieve the live intent
    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent>;
}
