use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const DECLINE_MESSAGE: &str = "Payment was declined. Please try a different card.";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    #[serde(default)]
    pub name: String,
    pub quantity: i32,
    /// Minor units.
    #[serde(default)]
    pub unit_price: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockPaymentRequest {
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
}

fn default_currency() -> String {
    "usd".to_string()
}

impl MockPaymentRequest {
    /// Every violated rule, in a fixed order. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.amount <= 0 {
            errors.push("Amount must be greater than 0".to_string());
        }
        if !self.customer_email.contains('@') {
            errors.push("Valid email is required".to_string());
        }
        if self.customer_name.trim().chars().count() < 2 {
            errors.push("Name must be at least 2 characters".to_string());
        }
        if self.items.is_empty() {
            errors.push("Cart cannot be empty".to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockPaymentReceipt {
    pub payment_id: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub amount: i64,
    pub currency: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum MockPaymentError {
    #[error("Invalid payment request: {}", .0.join(", "))]
    Invalid(Vec<String>),
    #[error("{0}")]
    Declined(String),
}

/// Local stand-in for a card processor.
pub struct MockPaymentSimulator {
    latency: Duration,
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl MockPaymentSimulator {
    pub fn new(latency: Duration, success_rate: f64) -> Self {
        Self::with_rng(latency, success_rate, StdRng::from_entropy())
    }

    pub fn with_seed(latency: Duration, success_rate: f64, seed: u64) -> Self {
        Self::with_rng(latency, success_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(latency: Duration, success_rate: f64, rng: StdRng) -> Self {
        Self {
            latency,
            success_rate: success_rate.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    pub async fn process(&self, request: &MockPaymentRequest) -> Result<MockPaymentReceipt, MockPaymentError> {
        let errors = request.validate();
        if !errors.is_empty() {
            return Err(MockPaymentError::Invalid(errors));
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        // The guard is dropped before anything else awaits.
        let (approved, number) = {
            let mut rng = self.rng.lock();
            (rng.gen_bool(self.success_rate), rng.gen_range(100_000..1_000_000))
        };

        if !approved {
            warn!("Mock payment of {} {} declined", request.amount, request.currency);
            return Err(MockPaymentError::Declined(DECLINE_MESSAGE.to_string()));
        }

        let receipt = MockPaymentReceipt {
            payment_id: format!("mock_pi_{}", Uuid::new_v4().simple()),
            order_id: Uuid::new_v4(),
            order_number: format!("ST-{:06}", number),
            amount: request.amount,
            currency: request.currency.to_lowercase(),
            processed_at: Utc::now(),
        };
        info!("Mock payment {} approved for order {}", receipt.payment_id, receipt.order_number);
        Ok(receipt)
    }
}
