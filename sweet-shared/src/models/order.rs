use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::events::StatusSource;
use crate::pii::Masked;

/// Order status as stored in the `orders.status` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Paid,
    PaymentFailed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses after which stock reserved for the order is handed back.
    pub fn releases_inventory(&self) -> bool {
        matches!(self, OrderStatus::PaymentFailed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "paid" => Ok(OrderStatus::Paid),
            "payment_failed" => Ok(OrderStatus::PaymentFailed),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

/// A customer's purchase, correlated with the processor by `payment_intent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<String>,
    pub customer_email: Option<Masked<String>>,
    pub payment_intent_id: Option<String>,
    pub status: OrderStatus,
    /// Minor currency units.
    pub total_amount: i64,
    pub currency: String,
    /// Time of the last status event that was applied to this row, on the
    /// clock of `status_source`.
    pub status_changed_at: Option<DateTime<Utc>>,
    pub status_source: Option<StatusSource>,
    /// Webhook event that handed the reserved stock back.
    pub inventory_release_event: Option<String>,
    pub inventory_released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn new(order_number: impl Into<String>, total_amount: i64, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.into(),
            user_id: None,
            customer_email: None,
            payment_intent_id: None,
            status: OrderStatus::Pending,
            total_amount,
            currency: currency.into(),
            status_changed_at: None,
            status_source: None,
            inventory_release_event: None,
            inventory_released_at: None,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_payment_intent(mut self, intent_id: impl Into<String>) -> Self {
        self.payment_intent_id = Some(intent_id.into());
        self
    }

    pub fn add_item(&mut self, product_id: Uuid, quantity: i32) -> &OrderItem {
        self.items.push(OrderItem::new(self.id, product_id, quantity));
        self.updated_at = Utc::now();
        &self.items[self.items.len() - 1]
    }

    /// Whether a status observed by `source` at `observed_at` may replace the current one.
    ///
    /// Timestamps are only compared within one source, ties included.
    /// A webhook always replaces a confirmation-written status; a
    /// confirmation never replaces a webhook-written one.
    pub fn accepts_status_from(&self, source: StatusSource, observed_at: DateTime<Utc>) -> bool {
        match (self.status_source, self.status_changed_at) {
            (Some(stored), Some(last)) if stored == source => observed_at >= last,
            (Some(StatusSource::Confirmation), Some(_)) => source == StatusSource::Webhook,
            (Some(StatusSource::Webhook), Some(_)) => false,
            _ => true,
        }
    }

    pub fn update_status(&mut self, status: OrderStatus, source: StatusSource, observed_at: DateTime<Utc>) {
        self.status = status;
        self.status_source = Some(source);
        self.status_changed_at = Some(observed_at);
        self.updated_at = Utc::now();
    }

    /// Reserves the stock release for `event_id`. Succeeds when nothing was
    /// released yet or when the same event retries its own release.
    pub fn claim_inventory_release(&mut self, event_id: &str) -> bool {
        match &self.inventory_release_event {
            Some(owner) if owner != event_id => false,
            _ => {
                self.inventory_release_event = Some(event_id.to_string());
                self.inventory_released_at = Some(Utc::now());
                true
            }
        }
    }
}

/// Line of an order. Only product and quantity matter to the payment flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

impl OrderItem {
    pub fn new(order_id: Uuid, product_id: Uuid, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity,
        }
    }
}
