use super::CacheStore;
use async_trait::async_trait;
use log::error;
use redis::{ AsyncCommands, Client };
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct RedisCache {
    conn: Arc<Mutex<MultiplexedConnection>>,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.conn.lock().await;
        match guard.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                error!("Cache GET failed for key '{}': {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let mut guard = self.conn.lock().await;
        let ttl_secs = ttl.as_secs();
        let result = if ttl_secs > 0 {
            guard.set_ex::<_, _, ()>(key, value, ttl_secs).await
        } else {
            guard.set::<_, _, ()>(key, value).await
        };
        if let Err(e) = result {
            error!("Cache SET failed for key '{}': {}", key, e);
        }
    }

    async fn delete(&self, key: &str) {
        let mut guard = self.conn.lock().await;
        if let Err(e) = guard.del::<_, ()>(key).await {
            error!("Cache DEL failed for key '{}': {}", key, e);
        }
    }
}
