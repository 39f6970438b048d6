pub mod memory;
pub mod redis;

use crate::cli::Args;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;
use std::time::Duration;

/// Key/value store with per-entry expiration. Strictly a performance layer:
/// callers implement cache-aside themselves, and every backend failure
/// degrades to a miss instead of surfacing an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str, ttl: Duration);
    async fn delete(&self, key: &str);
}

pub async fn init(args: &Args) -> Arc<dyn CacheStore> {
    match args.cache_type.to_lowercase().as_str() {
        "redis" => {
            match redis::RedisCache::connect(&args.cache_redis_url).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    warn!(
                        "Cache Redis unreachable at {} ({}). Running with in-memory cache.",
                        args.cache_redis_url,
                        e
                    );
                    Arc::new(memory::MemoryCache::new())
                }
            }
        }
        _ => Arc::new(memory::MemoryCache::new()),
    }
}
