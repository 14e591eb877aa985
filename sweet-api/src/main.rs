use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sweet_api::{app, AppState, AuthConfig};
use sweet_core::repository::{InventoryService, NotificationRepository};
use sweet_core::signature::SignatureVerifier;
use sweet_order::{MockPaymentSimulator, Notifier, PaymentOrchestrator, WebhookProcessor};
use sweet_store::app_config::Config;
use sweet_store::memory::MemoryNotificationRepository;
use sweet_store::{
    DbClient, InventoryFunctionClient, RedisNotificationRepository, StoreOrderRepository, StripePaymentAdapter,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sweet_api=debug,sweet_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Sweet Trip payments API on port {}", config.server.port);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")?;

    // Notification feed: Redis when configured, process memory otherwise.
    let feed: Arc<dyn NotificationRepository> = match &config.redis.url {
        Some(url) => Arc::new(RedisNotificationRepository::new(url).context("Invalid Redis URL")?),
        None => {
            tracing::warn!("No Redis URL configured; notifications are kept in memory");
            Arc::new(MemoryNotificationRepository::new())
        }
    };
    let (live_tx, _) = tokio::sync::broadcast::channel(100);
    let notifier = Notifier::new(feed, live_tx);

    // Orders
    let orders = match &config.database.url {
        Some(url) => {
            let db = DbClient::connect_lazy(url).context("Invalid database URL")?;
            if config.database.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            Some(Arc::new(
                StoreOrderRepository::new(db.pool.clone())
                    .with_claim_lease(Duration::from_secs(config.stripe.webhook_claim_lease_seconds)),
            ))
        }
        None => {
            tracing::warn!("No database URL configured; payment routes will report a configuration error");
            None
        }
    };

    let payments = match (&orders, &config.stripe.secret_key) {
        (Some(orders), Some(secret_key)) => {
            let adapter = StripePaymentAdapter::new(http.clone(), config.stripe.api_base.clone(), secret_key.clone());
            Some(Arc::new(PaymentOrchestrator::new(
                Arc::new(adapter),
                orders.clone(),
                notifier.clone(),
            )))
        }
        _ => None,
    };

    let inventory: Option<Arc<dyn InventoryService>> =
        match (&config.inventory.function_url, &config.inventory.service_key) {
            (Some(url), Some(key)) => Some(Arc::new(InventoryFunctionClient::new(http.clone(), url.clone(), key.clone()))),
            _ => None,
        };

    let webhooks = match (&orders, inventory) {
        (Some(orders), Some(inventory)) => Some(Arc::new(WebhookProcessor::new(
            orders.clone(),
            inventory,
            orders.clone(),
            notifier.clone(),
        ))),
        _ => None,
    };

    let signature = config.stripe.webhook_secret.as_ref().map(|secret| {
        Arc::new(SignatureVerifier::new(secret.clone()).with_tolerance(config.stripe.signature_tolerance_seconds))
    });

    let mock_payments = Arc::new(MockPaymentSimulator::new(
        Duration::from_millis(config.mock_payments.latency_ms),
        config.mock_payments.success_rate,
    ));

    let app_state = AppState {
        payments,
        webhooks,
        signature,
        mock_payments,
        notifier,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
