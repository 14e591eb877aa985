pub mod mock;
pub mod notifications;
pub mod orchestrator;
pub mod release;
pub mod status;
pub mod webhook;

pub use mock::{MockPaymentError, MockPaymentReceipt, MockPaymentRequest, MockPaymentSimulator};
pub use notifications::Notifier;
pub use orchestrator::{Confirmation, PaymentOrchestrator};
pub use release::{release_reserved_stock, ReleaseReport};
pub use webhook::{WebhookOutcome, WebhookProcessor};
