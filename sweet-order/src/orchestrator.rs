use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use sweet_core::payment::{NewPaymentIntent, PaymentAdapter, PaymentIntent, PaymentIntentStatus};
use sweet_core::repository::{OrderRepository, StatusPatch};
use sweet_core::{CoreError, CoreResult};
use sweet_shared::{Order, OrderStatus, StatusSource};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::notifications::Notifier;
use crate::status::confirmation_status;

/// Outcome of the synchronous confirmation path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub payment_intent_id: String,
    /// Raw processor status.
    pub status: PaymentIntentStatus,
    pub order_status: OrderStatus,
    pub order: Option<Order>,
}

pub struct PaymentOrchestrator {
    adapter: Arc<dyn PaymentAdapter>,
    orders: Arc<dyn OrderRepository>,
    notifier: Notifier,
}

impl PaymentOrchestrator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>, orders: Arc<dyn OrderRepository>, notifier: Notifier) -> Self {
        Self {
            adapter,
            orders,
            notifier,
        }
    }

    /// Creates a processor intent for an order and links the two.
    #[instrument(skip(self))]
    pub async fn initialize_payment(&self, order_id: Uuid) -> CoreResult<PaymentIntent> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;

        if let Some(existing) = &order.payment_intent_id {
            return Err(CoreError::ValidationError(format!(
                "order {} already has payment intent {}",
                order.order_number, existing
            )));
        }
        if order.total_amount <= 0 {
            return Err(CoreError::ValidationError(format!(
                "order {} has nothing to charge",
                order.order_number
            )));
        }

        let intent = self
            .adapter
            .create_intent(&NewPaymentIntent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                amount: order.total_amount,
                currency: order.currency.clone(),
                receipt_email: order.customer_email.as_ref().map(|e| e.expose().clone()),
            })
            .await?;

        self.orders.attach_payment_intent(order.id, &intent.id).await?;
        info!("Order {} linked to payment intent {}", order.order_number, intent.id);
        Ok(intent)
    }

    /// Re-reads the intent from the processor and mirrors it onto the order.
    ///
    /// Runs ahead of, and independently from, the webhook for the same
    /// intent. A status written by a webhook is never replaced here.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, intent_id: &str) -> CoreResult<Confirmation> {
        let intent_id = intent_id.trim();
        if intent_id.is_empty() {
            return Err(CoreError::ValidationError("paymentIntentId is required".to_string()));
        }

        let observed_at = Utc::now();
        let intent = self.adapter.get_intent(intent_id).await?;
        let order_status = confirmation_status(&intent.status);

        let order = match self
            .orders
            .apply_status(intent_id, order_status, StatusSource::Confirmation, observed_at)
            .await? {
            StatusPatch::Applied { order, previous } => {
                info!(
                    "Order {} moved {} -> {} after confirming {}",
                    order.order_number, previous, order.status, intent_id
                );
                self.notifier
                    .status_changed(&order, previous, StatusSource::Confirmation)
                    .await;
                Some(order)
            }
            StatusPatch::Stale(order) => {
                warn!(
                    "Order {} already reflects a processor event ({}); confirmation left it unchanged",
                    order.order_number, order.status
                );
                Some(order)
            }
            StatusPatch::NotFound => {
                warn!("No order found for payment intent {}", intent_id);
                None
            }
        };

        Ok(Confirmation {
            payment_intent_id: intent.id,
            status: intent.status,
            order_status,
            order,
        })
    }
}
