use async_trait::async_trait;
use serde::Serialize;
use sweet_core::repository::InventoryService;
use sweet_core::{CoreError, CoreResult};
use sweet_shared::OrderItem;
use tracing::debug;
use uuid::Uuid;

/// Client for the hosted inventory function.
#[derive(Clone)]
pub struct InventoryFunctionClient {
    http: reqwest::Client,
    function_url: String,
    service_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InventoryRequest<'a> {
    action: &'a str,
    product_id: Uuid,
    quantity: i32,
    order_id: Uuid,
}

impl InventoryFunctionClient {
    pub fn new(http: reqwest::Client, function_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            http,
            function_url: function_url.into(),
            service_key: service_key.into(),
        }
    }
}

#[async_trait]
impl InventoryService for InventoryFunctionClient {
    async fn release(&self, order_id: Uuid, item: &OrderItem) -> CoreResult<()> {
        let body = InventoryRequest {
            action: "release",
            product_id: item.product_id,
            quantity: item.quantity,
            order_id,
        };

        let response = self
            .http
            .post(&self.function_url)
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::UpstreamUnavailable(format!("inventory function: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::InventoryError(format!(
                "release of product {} returned {}: {}",
                item.product_id, status, text
            )));
        }

        debug!("Released {} x {} for order {}", item.quantity, item.product_id, order_id);
        Ok(())
    }
}
