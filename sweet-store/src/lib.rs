pub mod app_config;
pub mod database;
pub mod inventory;
pub mod memory;
pub mod order_repo;
pub mod redis_repo;
pub mod stripe;

pub use database::DbClient;
pub use inventory::InventoryFunctionClient;
pub use order_repo::StoreOrderRepository;
pub use redis_repo::RedisNotificationRepository;
pub use stripe::StripePaymentAdapter;
