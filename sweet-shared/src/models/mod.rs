pub mod events;
pub mod notification;
pub mod order;
