use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use sweet_shared::{Notification, Order, OrderItem, OrderStatus, StatusSource};
use uuid::Uuid;

use crate::CoreResult;

/// Result of a conditional status patch.
#[derive(Debug, Clone)]
pub enum StatusPatch {
    /// The row was updated; `previous` is the status it held before.
    Applied { order: Order, previous: OrderStatus },
    /// A status that takes precedence had already been applied, the row is unchanged.
    Stale(Order),
    /// No order carries this payment intent id.
    NotFound,
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>>;

    async fn find_by_payment_intent(&self, intent_id: &str) -> CoreResult<Option<Order>>;

    /// Links an intent to an order. Fails with `DuplicateIntent` when the
    /// intent already belongs to a different order.
    async fn attach_payment_intent(&self, order_id: Uuid, intent_id: &str) -> CoreResult<()>;

    /// Sets the status of the order holding `intent_id` when
    /// [`Order::accepts_status_from`] allows it for `source` at `observed_at`.
    async fn apply_status(
        &self,
        intent_id: &str,
        status: OrderStatus,
        source: StatusSource,
        observed_at: DateTime<Utc>,
    ) -> CoreResult<StatusPatch>;

    async fn order_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>>;

    /// Records `event_id` as the event that hands the order's stock back.
    /// Returns `false` when another event already owns the release.
    async fn claim_inventory_release(&self, order_id: Uuid, event_id: &str) -> CoreResult<bool>;
}

/// How long an unfinished ledger claim blocks a retry of the same event.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(120);

/// Processed-event ledger guarding webhook replays.
///
/// A claim is `processing` until completed. A processing claim older than
/// the ledger's lease can be taken over, so an attempt that never finished
/// does not swallow the provider's retry.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Returns `false` when the event is completed or held by a live claim.
    async fn claim(&self, event_id: &str, event_type: &str) -> CoreResult<bool>;

    /// Marks a claimed event as done; later deliveries are duplicates.
    async fn complete(&self, event_id: &str) -> CoreResult<()>;

    /// Drops a claim so the provider's retry can be processed.
    async fn release(&self, event_id: &str) -> CoreResult<()>;
}

/// External stock service.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn release(&self, order_id: Uuid, item: &OrderItem) -> CoreResult<()>;
}

/// Per-user notification feed, capped at `NOTIFICATION_FEED_LIMIT` entries.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn push(&self, notification: &Notification) -> CoreResult<()>;

    /// Newest first.
    async fn recent(&self, user_id: &str) -> CoreResult<Vec<Notification>>;

    async fn clear(&self, user_id: &str) -> CoreResult<()>;
}
