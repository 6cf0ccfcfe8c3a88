// Redis cache backend

use super::Cache;
use crate::config::RedisConfig;
use crate::errors::StorageError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, instrument};

/// Multiplexed Redis connection shared by the cache and the locks
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
}

impl RedisPool {
    #[instrument(skip(config), fields(redis_url = %config.url))]
    pub async fn connect(config: &RedisConfig) -> Result<Self, StorageError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| StorageError::ConnectionFailed(format!("Invalid Redis URL: {}", e)))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::Unavailable(format!("Redis unreachable: {}", e)))?;

        info!("Redis connection established");
        Ok(Self { manager })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.connection();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Cache shared by every engine instance through Redis
///
/// Queues are Redis lists: RPUSH at the tail, LPOP at the head.
#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
}

impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.pool.connection();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.pool.connection();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    #[instrument(skip(self, value), fields(ttl_seconds = ttl.as_secs()))]
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let mut conn = self.pool.connection();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.pool.connection();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn enqueue(&self, queue: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.pool.connection();
        let _: () = conn.rpush(queue, value).await?;
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.pool.connection();
        let value: Option<String> = conn.lpop(queue, None).await?;
        Ok(value)
    }

    async fn queue_len(&self, queue: &str) -> Result<usize, StorageError> {
        let mut conn = self.pool.connection();
        let len: usize = conn.llen(queue).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
            pool_size: 1,
        };
        assert!(matches!(
            RedisPool::connect(&config).await,
            Err(StorageError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_queue_round_trip() {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
        };
        let cache = RedisCache::new(RedisPool::connect(&config).await.unwrap());

        cache.delete("cdflow:test:queue").await.unwrap();
        cache.enqueue("cdflow:test:queue", "first").await.unwrap();
        cache.enqueue("cdflow:test:queue", "second").await.unwrap();

        assert_eq!(cache.queue_len("cdflow:test:queue").await.unwrap(), 2);
        assert_eq!(
            cache.dequeue("cdflow:test:queue").await.unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            cache.dequeue("cdflow:test:queue").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(cache.dequeue("cdflow:test:queue").await.unwrap(), None);
    }
}
