use sweet_core::payment::PaymentIntentStatus;
use sweet_core::webhook::EventKind;
use sweet_shared::OrderStatus;

/// Order status for a processor status seen on the confirmation path.
pub fn confirmation_status(intent_status: &PaymentIntentStatus) -> OrderStatus {
    match intent_status {
        PaymentIntentStatus::Succeeded => OrderStatus::Confirmed,
        PaymentIntentStatus::Canceled => OrderStatus::Cancelled,
        PaymentIntentStatus::PaymentFailed => OrderStatus::Failed,
        _ => OrderStatus::Pending,
    }
}

/// Order status a webhook event moves the order to, if it is one we act on.
pub fn webhook_status(kind: &EventKind) -> Option<OrderStatus> {
    match kind {
        EventKind::PaymentSucceeded => Some(OrderStatus::Paid),
        EventKind::PaymentFailed => Some(OrderStatus::PaymentFailed),
        EventKind::PaymentCanceled => Some(OrderStatus::Cancelled),
        EventKind::Other(_) => None,
    }
}
