use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use sweet_core::repository::{EventLedger, OrderRepository, StatusPatch, DEFAULT_CLAIM_LEASE};
use sweet_core::{CoreError, CoreResult};
use sweet_shared::{Masked, Order, OrderItem, OrderStatus, StatusSource};
use tracing::debug;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_email, payment_intent_id, status, \
     total_amount, currency, status_changed_at, status_source, inventory_release_event, \
     inventory_released_at, created_at, updated_at";

pub struct StoreOrderRepository {
    pool: PgPool,
    claim_lease: Duration,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    async fn load_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, quantity FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn hydrate(&self, row: OrderRow) -> CoreResult<Order> {
        let items = self.load_items(row.id).await?;
        row.into_order(items)
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Option<String>,
    customer_email: Option<String>,
    payment_intent_id: Option<String>,
    status: String,
    total_amount: i64,
    currency: String,
    status_changed_at: Option<DateTime<Utc>>,
    status_source: Option<String>,
    inventory_release_event: Option<String>,
    inventory_released_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> CoreResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| CoreError::StoreError(format!("order {}: {}", self.id, e)))?;
        let status_source = self
            .status_source
            .as_deref()
            .map(str::parse::<StatusSource>)
            .transpose()
            .map_err(|e| CoreError::StoreError(format!("order {}: {}", self.id, e)))?;

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            customer_email: self.customer_email.map(Masked::new),
            payment_intent_id: self.payment_intent_id,
            status,
            total_amount: self.total_amount,
            currency: self.currency,
            status_changed_at: self.status_changed_at,
            status_source,
            inventory_release_event: self.inventory_release_event,
            inventory_released_at: self.inventory_released_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PatchedRow {
    #[sqlx(flatten)]
    order: OrderRow,
    previous_status: String,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
        }
    }
}

fn store_error(err: sqlx::Error) -> CoreError {
    CoreError::StoreError(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_payment_intent(&self, intent_id: &str) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE payment_intent_id = $1",
            ORDER_COLUMNS
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn attach_payment_intent(&self, order_id: Uuid, intent_id: &str) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET payment_intent_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(order_id)
        .bind(intent_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::DuplicateIntent(intent_id.to_string())
            } else {
                store_error(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("order {}", order_id)));
        }
        Ok(())
    }

    async fn apply_status(
        &self,
        intent_id: &str,
        status: OrderStatus,
        source: StatusSource,
        observed_at: DateTime<Utc>,
    ) -> CoreResult<StatusPatch> {
        // The CTE locks the row and captures the status it held before the write.
        // Precedence mirrors Order::accepts_status_from.
        let patched: Option<PatchedRow> = sqlx::query_as(
            r#"
            WITH target AS (
                SELECT id, status AS previous_status
                FROM orders
                WHERE payment_intent_id = $1
                FOR UPDATE
            )
            UPDATE orders o
            SET status = $2, status_changed_at = $3, status_source = $4, updated_at = NOW()
            FROM target
            WHERE o.id = target.id
              AND (
                    o.status_changed_at IS NULL
                 OR o.status_source IS NULL
                 OR (o.status_source = 'confirmation' AND $4 = 'webhook')
                 OR (o.status_source = $4 AND o.status_changed_at <= $3)
              )
            RETURNING o.id, o.order_number, o.user_id, o.customer_email, o.payment_intent_id,
                      o.status, o.total_amount, o.currency, o.status_changed_at,
                      o.status_source, o.inventory_release_event, o.inventory_released_at,
                      o.created_at, o.updated_at, target.previous_status
            "#,
        )
        .bind(intent_id)
        .bind(status.as_str())
        .bind(observed_at)
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        if let Some(row) = patched {
            let previous = row
                .previous_status
                .parse::<OrderStatus>()
                .map_err(|e| CoreError::StoreError(e.to_string()))?;
            let order = self.hydrate(row.order).await?;
            debug!(order_id = %order.id, %previous, current = %order.status, "status patch applied");
            return Ok(StatusPatch::Applied { order, previous });
        }

        match self.find_by_payment_intent(intent_id).await? {
            Some(order) => Ok(StatusPatch::Stale(order)),
            None => Ok(StatusPatch::NotFound),
        }
    }

    async fn order_items(&self, order_id: Uuid) -> CoreResult<Vec<OrderItem>> {
        self.load_items(order_id).await
    }

    async fn claim_inventory_release(&self, order_id: Uuid, event_id: &str) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET inventory_release_event = $2, inventory_released_at = NOW(), updated_at = NOW()
            WHERE id = $1
              AND (inventory_release_event IS NULL OR inventory_release_event = $2)
            "#,
        )
        .bind(order_id)
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl EventLedger for StoreOrderRepository {
    async fn claim(&self, event_id: &str, event_type: &str) -> CoreResult<bool> {
        // A conflicting row is only taken over while it is an expired processing claim.
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (event_id, event_type, state, claimed_at, processed_at)
            VALUES ($1, $2, 'processing', NOW(), NULL)
            ON CONFLICT (event_id) DO UPDATE SET claimed_at = NOW()
            WHERE processed_webhook_events.state = 'processing'
              AND processed_webhook_events.claimed_at < NOW() - make_interval(secs => $3)
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(self.claim_lease.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete(&self, event_id: &str) -> CoreResult<()> {
        sqlx::query(
            "UPDATE processed_webhook_events SET state = 'done', processed_at = NOW() WHERE event_id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn release(&self, event_id: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = $1 AND state = 'processing'")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
