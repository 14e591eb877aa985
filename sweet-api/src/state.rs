use std::sync::Arc;
use sweet_core::signature::SignatureVerifier;
use sweet_order::{MockPaymentSimulator, Notifier, PaymentOrchestrator, WebhookProcessor};

#[derive(Clone, Default)]
pub struct AuthConfig {
    pub secret: Option<String>,
}

/// Shared handles. A `None` service means its configuration is missing;
/// the routes that need it answer with a configuration error.
#[derive(Clone)]
pub struct AppState {
    pub payments: Option<Arc<PaymentOrchestrator>>,
    pub webhooks: Option<Arc<WebhookProcessor>>,
    pub signature: Option<Arc<SignatureVerifier>>,
    pub mock_payments: Arc<MockPaymentSimulator>,
    pub notifier: Notifier,
    pub auth: AuthConfig,
}
