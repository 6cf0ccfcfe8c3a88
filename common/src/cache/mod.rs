// Shared cache: data cache, coordination flags and FIFO queues
//
// Values are stored as JSON text so every process sharing the backend reads
// the same representation.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::{RedisCache, RedisPool};

use crate::errors::StorageError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Raw cache operations
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Append to the tail of a queue
    async fn enqueue(&self, queue: &str, value: &str) -> Result<(), StorageError>;

    /// Pop from the head of a queue; `None` when empty
    async fn dequeue(&self, queue: &str) -> Result<Option<String>, StorageError>;

    async fn queue_len(&self, queue: &str) -> Result<usize, StorageError>;
}

/// Typed JSON helpers over any [`Cache`]
#[async_trait]
pub trait CacheExt: Cache {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, StorageError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }

    async fn enqueue_json<T>(&self, queue: &str, value: &T) -> Result<(), StorageError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.enqueue(queue, &raw).await
    }

    async fn dequeue_json<T>(&self, queue: &str) -> Result<Option<T>, StorageError>
    where
        T: DeserializeOwned + Send,
    {
        match self.dequeue(queue).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Build a cache key from its segments
pub fn key(parts: &[&str]) -> String {
    parts.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_joins_segments() {
        assert_eq!(
            key(&["worker", "modelcapabilities", "42"]),
            "worker:modelcapabilities:42"
        );
    }

    #[tokio::test]
    async fn test_json_helpers_through_trait_object() {
        let cache: std::sync::Arc<dyn Cache> = std::sync::Arc::new(MemoryCache::new());

        cache.set_json("flag", &true).await.unwrap();
        assert_eq!(cache.get_json::<bool>("flag").await.unwrap(), Some(true));
        assert_eq!(cache.get_json::<bool>("missing").await.unwrap(), None);

        cache.enqueue_json("q", &vec![1, 2]).await.unwrap();
        assert_eq!(
            cache.dequeue_json::<Vec<i32>>("q").await.unwrap(),
            Some(vec![1, 2])
        );
    }

    #[tokio::test]
    async fn test_get_json_reports_corrupt_value() {
        let cache = MemoryCache::new();
        cache.set("flag", "not json").await.unwrap();
        let result = cache.get_json::<bool>("flag").await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
