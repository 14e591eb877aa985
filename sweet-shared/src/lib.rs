pub mod models;
pub mod pii;

pub use models::events::{OrderStatusChanged, StatusSource, UnknownStatusSource};
pub use models::notification::{Notification, NOTIFICATION_FEED_LIMIT};
pub use models::order::{Order, OrderItem, OrderStatus, UnknownOrderStatus};
pub use pii::Masked;
