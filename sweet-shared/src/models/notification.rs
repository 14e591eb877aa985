use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::OrderStatus;

/// Entries kept per user feed; older ones are evicted.
pub const NOTIFICATION_FEED_LIMIT: usize = 10;

/// User-facing note about an order status change. Not authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
