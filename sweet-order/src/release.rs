use futures_util::future::join_all;
use serde::Serialize;
use sweet_core::repository::InventoryService;
use sweet_shared::OrderItem;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRelease {
    pub product_id: Uuid,
    pub quantity: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseReport {
    pub released: Vec<Uuid>,
    pub failed: Vec<FailedRelease>,
}

impl ReleaseReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Hands reserved stock back, one independent call per item.
///
/// A failing item is logged and recorded; it never stops the others.
/// Nothing is retried or rolled back.
pub async fn release_reserved_stock(
    inventory: &dyn InventoryService,
    order_id: Uuid,
    items: &[OrderItem],
) -> ReleaseReport {
    let outcomes = join_all(items.iter().map(|item| async move {
        (item, inventory.release(order_id, item).await)
    }))
    .await;

    let mut report = ReleaseReport::default();
    for (item, outcome) in outcomes {
        match outcome {
            Ok(()) => report.released.push(item.product_id),
            Err(e) => {
                error!(
                    "Failed to release {} x {} for order {}: {}",
                    item.quantity, item.product_id, order_id, e
                );
                report.failed.push(FailedRelease {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Inventory release for order {}: {} released, {} failed",
        order_id,
        report.released.len(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweet_store::memory::MemoryInventory;

    #[tokio::test]
    async fn one_call_per_item() {
        let inventory = MemoryInventory::new();
        let order_id = Uuid::new_v4();
        let items = vec![
            OrderItem::new(order_id, Uuid::new_v4(), 2),
            OrderItem::new(order_id, Uuid::new_v4(), 1),
            OrderItem::new(order_id, Uuid::new_v4(), 5),
        ];
        for item in &items {
            inventory.initialize(item.product_id, 10).await;
        }

        let report = release_reserved_stock(&inventory, order_id, &items).await;

        assert!(report.is_complete());
        assert_eq!(report.released.len(), 3);
        assert_eq!(inventory.calls().await.len(), 3);
        assert_eq!(inventory.available(items[2].product_id).await, Some(15));
    }

    #[tokio::test]
    async fn failure_does_not_abort_remaining_items() {
        let inventory = MemoryInventory::new();
        let order_id = Uuid::new_v4();
        let broken = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        inventory.fail_for(broken).await;
        inventory.initialize(healthy, 0).await;

        let items = vec![
            OrderItem::new(order_id, broken, 1),
            OrderItem::new(order_id, healthy, 4),
        ];
        let report = release_reserved_stock(&inventory, order_id, &items).await;

        assert!(!report.is_complete());
        assert_eq!(report.released, vec![healthy]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].product_id, broken);
        assert_eq!(inventory.available(healthy).await, Some(4));
        assert_eq!(inventory.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn fan_out_alone_is_not_idempotent() {
        // Replay protection lives in the event ledger, not here.
        let inventory = MemoryInventory::new();
        let order_id = Uuid::new_v4();
        let product = Uuid::new_v4();
        inventory.initialize(product, 0).await;
        let items = vec![OrderItem::new(order_id, product, 3)];

        release_reserved_stock(&inventory, order_id, &items).await;
        release_reserved_stock(&inventory, order_id, &items).await;

        assert_eq!(inventory.available(product).await, Some(6));
        assert_eq!(inventory.calls().await.len(), 2);
    }
}
