use chrono::Utc;
use std::sync::Arc;
use sweet_core::repository::NotificationRepository;
use sweet_shared::{Notification, Order, OrderStatus, OrderStatusChanged, StatusSource};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Turns applied status changes into feed entries and live pushes.
///
/// Notifications are best effort: every failure here is logged and
/// swallowed so it can never fail a payment reconciliation.
#[derive(Clone)]
pub struct Notifier {
    feed: Arc<dyn NotificationRepository>,
    live: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(feed: Arc<dyn NotificationRepository>, live: broadcast::Sender<Notification>) -> Self {
        Self { feed, live }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.live.subscribe()
    }

    pub fn feed(&self) -> &Arc<dyn NotificationRepository> {
        &self.feed
    }

    pub async fn status_changed(&self, order: &Order, previous: OrderStatus, source: StatusSource) {
        let change = OrderStatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id.clone(),
            previous,
            current: order.status,
            source,
            occurred_at: Utc::now(),
        };

        let Some(notification) = compose(&change) else {
            debug!(order_id = %order.id, "no notification for status change");
            return;
        };

        if let Err(e) = self.feed.push(&notification).await {
            warn!("Failed to store notification for order {}: {}", order.order_number, e);
        }
        // No subscribers is the normal case.
        let _ = self.live.send(notification);
    }
}

/// `None` when nothing changed or the order has no owner to notify.
pub fn compose(change: &OrderStatusChanged) -> Option<Notification> {
    if change.previous == change.current {
        return None;
    }
    let user_id = change.user_id.clone()?;
    let number = &change.order_number;

    let (title, message) = match change.current {
        OrderStatus::Confirmed => (
            "Payment confirmed",
            format!("Your payment for order {} went through. We're getting your sweets ready!", number),
        ),
        OrderStatus::Paid => (
            "Payment received",
            format!("We've received payment for order {}.", number),
        ),
        OrderStatus::PaymentFailed | OrderStatus::Failed => (
            "Payment failed",
            format!(
                "Payment for order {} didn't go through. Please try again or use another payment method.",
                number
            ),
        ),
        OrderStatus::Cancelled => (
            "Order cancelled",
            format!("Order {} was cancelled.", number),
        ),
        OrderStatus::Pending => (
            "Payment pending",
            format!("Payment for order {} is still being processed.", number),
        ),
    };

    Some(Notification {
        id: Uuid::new_v4(),
        user_id,
        order_id: change.order_id,
        order_number: change.order_number.clone(),
        status: change.current,
        title: title.to_string(),
        message,
        read: false,
        created_at: change.occurred_at,
    })
}
