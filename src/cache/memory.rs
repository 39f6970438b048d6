use super::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Process-local cache backend. Used directly in tests and as the runtime
/// fallback when the shared Redis instance is unreachable at startup.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expiry)) => {
                    if expiry.map(|at| Instant::now() >= at).unwrap_or(false) {
                        true
                    } else {
                        return Some(value.clone());
                    }
                }
                None => {
                    return None;
                }
            }
        };
        if expired {
            self.entries.write().await.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let expiry = if ttl.is_zero() { None } else { Some(Instant::now() + ttl) };
        self.entries.write().await.insert(key.to_string(), (value.to_string(), expiry));
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
