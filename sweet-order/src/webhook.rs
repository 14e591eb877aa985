use std::sync::Arc;
use sweet_core::repository::{EventLedger, InventoryService, OrderRepository, StatusPatch};
use sweet_core::webhook::WebhookEvent;
use sweet_core::CoreResult;
use sweet_shared::{Order, OrderStatus, StatusSource};
use tracing::{error, info, instrument, warn};

use crate::notifications::Notifier;
use crate::release::{release_reserved_stock, ReleaseReport};
use crate::status::webhook_status;

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// Event type we do not act on.
    Ignored,
    /// Already processed; nothing was reapplied.
    Duplicate,
    OrderNotFound,
    /// The order already held a status that takes precedence. Stock is
    /// still handed back when that status releases it and no other event
    /// has done so.
    Stale {
        order: Order,
        release: Option<ReleaseReport>,
    },
    Applied {
        order: Order,
        release: Option<ReleaseReport>,
    },
}

/// Applies verified processor events to orders.
pub struct WebhookProcessor {
    orders: Arc<dyn OrderRepository>,
    inventory: Arc<dyn InventoryService>,
    ledger: Arc<dyn EventLedger>,
    notifier: Notifier,
}

impl WebhookProcessor {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        inventory: Arc<dyn InventoryService>,
        ledger: Arc<dyn EventLedger>,
        notifier: Notifier,
    ) -> Self {
        Self {
            orders,
            inventory,
            ledger,
            notifier,
        }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn process(&self, event: &WebhookEvent) -> CoreResult<WebhookOutcome> {
        let Some(status) = webhook_status(&event.kind()) else {
            info!("Ignoring webhook event type {}", event.event_type);
            return Ok(WebhookOutcome::Ignored);
        };
        let intent = event.payment_intent()?;

        if !self.ledger.claim(&event.id, &event.event_type).await? {
            info!("Event {} already processed, acknowledging replay", event.id);
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = self.apply(event, &intent.id, status).await;
        let finished = matches!(
            outcome,
            Ok(WebhookOutcome::Applied { .. }) | Ok(WebhookOutcome::Stale { .. })
        );
        let settled = if finished {
            self.ledger.complete(&event.id).await
        } else {
            self.ledger.release(&event.id).await
        };
        if let Err(e) = settled {
            error!("Failed to settle claim on event {}: {}", event.id, e);
        }
        outcome
    }

    async fn apply(&self, event: &WebhookEvent, intent_id: &str, status: OrderStatus) -> CoreResult<WebhookOutcome> {
        let patch = self
            .orders
            .apply_status(intent_id, status, StatusSource::Webhook, event.occurred_at())
            .await?;

        let (order, applied) = match patch {
            StatusPatch::Applied { order, previous } => {
                info!(
                    "Order {} moved {} -> {} from {}",
                    order.order_number, previous, order.status, event.event_type
                );
                self.notifier
                    .status_changed(&order, previous, StatusSource::Webhook)
                    .await;
                (order, true)
            }
            StatusPatch::Stale(order) => {
                warn!(
                    "Skipping stale {} for order {} (currently {})",
                    event.event_type, order.order_number, order.status
                );
                (order, false)
            }
            StatusPatch::NotFound => {
                warn!("No order found for payment intent {}", intent_id);
                return Ok(WebhookOutcome::OrderNotFound);
            }
        };

        let release = if status.releases_inventory() && order.status.releases_inventory() {
            self.release_stock(event, &order).await?
        } else {
            if applied && order.status == OrderStatus::Paid {
                let customer = order
                    .customer_email
                    .as_ref()
                    .map(|email| email.redacted())
                    .unwrap_or_else(|| "guest".to_string());
                info!(
                    "Order {} paid: {} {} for {}",
                    order.order_number, order.total_amount, order.currency, customer
                );
            }
            None
        };

        Ok(if applied {
            WebhookOutcome::Applied { order, release }
        } else {
            WebhookOutcome::Stale { order, release }
        })
    }

    /// Hands the order's stock back unless another event already owns that release.
    async fn release_stock(&self, event: &WebhookEvent, order: &Order) -> CoreResult<Option<ReleaseReport>> {
        // Items first: a read failure must leave the release unclaimed for the retry.
        let items = self.orders.order_items(order.id).await?;
        if !self.orders.claim_inventory_release(order.id, &event.id).await? {
            info!(
                "Stock for order {} was already released by another event",
                order.order_number
            );
            return Ok(None);
        }
        Ok(Some(release_reserved_stock(self.inventory.as_ref(), order.id, &items).await))
    }
}
