//! In-process backends.
//!
//! They honour the same contracts as the Postgres/Redis/HTTP ones (unique
//! intent ids, conditional status patches, capped feeds) and back local
//! development and the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use sweet_core::payment::{NewPaymentIntent, PaymentAdapter, PaymentIntent, PaymentIntentStatus};
use sweet_core::repository::{
    EventLedger, InventoryService, NotificationRepository, OrderRepository, StatusPatch, DEFAULT_CLAIM_LEASE,
};
use sweet_core::{CoreError, CoreResult};
use sweet_shared::{
    Notification, Order, OrderItem, OrderStatus, StatusSource, NOTIFICATION_FEED_LIMIT,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        if let Some(intent_id) = &order.payment_intent_id {
            let taken = orders
                .values()
                .any(|o| o.id != order.id && o.payment_intent_id.as_deref() == Some(intent_id.as_str()));
            if taken {
                return Err(CoreError::DuplicateIntent(intent_id.clone()));
            }
        }
        orders.insert(order.id, order);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_payment_intent(&self, intent_id: &str) -> CoreResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.payment_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn attach_payment_intent(&self, order_id: Uuid, intent_id: &str) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        let taken = orders
            .values()
            .any(|o| o.id != order_id && o.payment_intent_id.as_deref() == Some(intent_id));
        if taken {
            return Err(CoreError::DuplicateIntent(intent_id.to_string()));
        }
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        order.payment_intent_id = Some(intent_id.to_string());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_status(
        &self,
        intent_id: &str,
        status: OrderStatus,
        source: StatusSource,
        observed_at: DateTime<Utc>,
    ) -> CoreResult<StatusPatch> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders
            .values_mut()
            .find(|o| o.payment_intent_id.as_deref() == Some(intent_id))
        else {
            return Ok(StatusPatch::NotFound);
        };

        if !order.accepts_status_from(source, observed_at) {
            return Ok(StatusPatch::Stale(order.clone()));
        }

        let previous = order.status;
        order.update_status(status, source, observed_at);
        Ok(StatusPatch::Applied {
            order: order.clone(),
            previous,
        })
    }

    async fn order_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>> {
        Ok(self
            .orders
            .read()
            .await
            .get(&order_id)
            .map(|o| o.items.clone())
            .unwrap_or_default())
    }

    async fn claim_inventory_release(&self, order_id: Uuid, event_id: &str) -> CoreResult<bool> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        Ok(order.claim_inventory_release(event_id))
    }
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    done: bool,
    claimed_at: Instant,
}

pub struct MemoryEventLedger {
    claims: RwLock<HashMap<String, Claim>>,
    lease: Duration,
}

impl Default for MemoryEventLedger {
    fn default() -> Self {
        Self::with_lease(DEFAULT_CLAIM_LEASE)
    }
}

impl MemoryEventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            claims: RwLock::new(HashMap::new()),
            lease,
        }
    }

    pub async fn contains(&self, event_id: &str) -> bool {
        self.claims.read().await.contains_key(event_id)
    }

    pub async fn is_done(&self, event_id: &str) -> bool {
        self.claims
            .read()
            .await
            .get(event_id)
            .map(|claim| claim.done)
            .unwrap_or(false)
    }
}

#[async_trait]
impl EventLedger for MemoryEventLedger {
    async fn claim(&self, event_id: &str, _event_type: &str) -> CoreResult<bool> {
        let mut claims = self.claims.write().await;
        match claims.get_mut(event_id) {
            Some(claim) if claim.done || claim.claimed_at.elapsed() < self.lease => Ok(false),
            Some(claim) => {
                claim.claimed_at = Instant::now();
                Ok(true)
            }
            None => {
                claims.insert(
                    event_id.to_string(),
                    Claim {
                        done: false,
                        claimed_at: Instant::now(),
                    },
                );
                Ok(true)
            }
        }
    }

    async fn complete(&self, event_id: &str) -> CoreResult<()> {
        if let Some(claim) = self.claims.write().await.get_mut(event_id) {
            claim.done = true;
        }
        Ok(())
    }

    async fn release(&self, event_id: &str) -> CoreResult<()> {
        let mut claims = self.claims.write().await;
        if claims.get(event_id).is_some_and(|claim| !claim.done) {
            claims.remove(event_id);
        }
        Ok(())
    }
}

/// A release the inventory backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCall {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Stock levels per product, with optional injected failures.
#[derive(Default)]
pub struct MemoryInventory {
    available: RwLock<HashMap<Uuid, i32>>,
    failing: RwLock<HashSet<Uuid>>,
    calls: RwLock<Vec<ReleaseCall>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn initialize(&self, product_id: Uuid, available: i32) {
        self.available.write().await.insert(product_id, available);
    }

    /// Makes every release of `product_id` fail.
    pub async fn fail_for(&self, product_id: Uuid) {
        self.failing.write().await.insert(product_id);
    }

    pub async fn available(&self, product_id: Uuid) -> Option<i32> {
        self.available.read().await.get(&product_id).copied()
    }

    pub async fn calls(&self) -> Vec<ReleaseCall> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl InventoryService for MemoryInventory {
    async fn release(&self, order_id: Uuid, item: &OrderItem) -> CoreResult<()> {
        self.calls.write().await.push(ReleaseCall {
            order_id,
            product_id: item.product_id,
            quantity: item.quantity,
        });

        if self.failing.read().await.contains(&item.product_id) {
            return Err(CoreError::InventoryError(format!(
                "product {} is not tracked",
                item.product_id
            )));
        }

        *self.available.write().await.entry(item.product_id).or_insert(0) += item.quantity;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNotificationRepository {
    feeds: RwLock<HashMap<String, VecDeque<Notification>>>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn push(&self, notification: &Notification) -> CoreResult<()> {
        let mut feeds = self.feeds.write().await;
        let feed = feeds.entry(notification.user_id.clone()).or_default();
        feed.push_front(notification.clone());
        feed.truncate(NOTIFICATION_FEED_LIMIT);
        Ok(())
    }

    async fn recent(&self, user_id: &str) -> CoreResult<Vec<Notification>> {
        Ok(self
            .feeds
            .read()
            .await
            .get(user_id)
            .map(|feed| feed.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, user_id: &str) -> CoreResult<()> {
        self.feeds.write().await.remove(user_id);
        Ok(())
    }
}

/// Processor stand-in whose intents are scripted by the caller.
#[derive(Default)]
pub struct MemoryPaymentAdapter {
    intents: RwLock<HashMap<String, PaymentIntent>>,
}

impl MemoryPaymentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, intent_id: &str, status: impl Into<PaymentIntentStatus>) {
        let status = status.into();
        let mut intents = self.intents.write().await;
        intents
            .entry(intent_id.to_string())
            .and_modify(|intent| intent.status = status.clone())
            .or_insert_with(|| PaymentIntent {
                id: intent_id.to_string(),
                amount: 0,
                currency: "usd".to_string(),
                status,
                client_secret: None,
                metadata: HashMap::new(),
                created: Some(Utc::now().timestamp()),
            });
    }
}

#[async_trait]
impl PaymentAdapter for MemoryPaymentAdapter {
    async fn create_intent(&self, request: &NewPaymentIntent) -> CoreResult<PaymentIntent> {
        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), request.order_id.to_string());
        metadata.insert("order_number".to_string(), request.order_number.clone());

        let intent = PaymentIntent {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency.to_lowercase(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
            metadata,
            created: Some(Utc::now().timestamp()),
        };
        self.intents.write().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, intent_id: &str) -> CoreResult<PaymentIntent> {
        self.intents
            .read()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| CoreError::ProviderError {
                status: 404,
                message: format!("No such payment_intent: '{}'", intent_id),
            })
    }
}
