use async_trait::async_trait;
use redis::AsyncCommands;
use sweet_core::repository::NotificationRepository;
use sweet_core::{CoreError, CoreResult};
use sweet_shared::{Notification, NOTIFICATION_FEED_LIMIT};
use tracing::{info, warn};

/// Notification feeds kept as capped Redis lists, newest at the head.
#[derive(Clone)]
pub struct RedisNotificationRepository {
    client: redis::Client,
}

impl RedisNotificationRepository {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(user_id: &str) -> String {
        format!("notifications:{}", user_id)
    }
}

fn redis_error(err: redis::RedisError) -> CoreError {
    CoreError::StoreError(format!("redis: {}", err))
}

#[async_trait]
impl NotificationRepository for RedisNotificationRepository {
    async fn push(&self, notification: &Notification) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;
        let key = Self::key(&notification.user_id);
        let payload = serde_json::to_string(notification)
            .map_err(|e| CoreError::InternalError(e.to_string()))?;

        redis::pipe()
            .atomic()
            .lpush(&key, payload)
            .ignore()
            .ltrim(&key, 0, NOTIFICATION_FEED_LIMIT as isize - 1)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_error)?;

        info!("Notification {} queued for user feed", notification.id);
        Ok(())
    }

    async fn recent(&self, user_id: &str) -> CoreResult<Vec<Notification>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;
        let raw: Vec<String> = conn
            .lrange(Self::key(user_id), 0, NOTIFICATION_FEED_LIMIT as isize - 1)
            .await
            .map_err(redis_error)?;

        // A corrupt entry costs one notification, not the whole feed.
        let feed = raw
            .iter()
            .filter_map(|entry| match serde_json::from_str::<Notification>(entry) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("Skipping unreadable notification entry: {}", e);
                    None
                }
            })
            .collect();
        Ok(feed)
    }

    async fn clear(&self, user_id: &str) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;
        let _: () = conn.del(Self::key(user_id)).await.map_err(redis_error)?;
        Ok(())
    }
}
