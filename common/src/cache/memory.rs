// In-process cache backend

use super::Cache;
use crate::errors::StorageError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct Inner {
    values: HashMap<String, (String, Option<Instant>)>,
    queues: HashMap<String, VecDeque<String>>,
}

/// Cache living in this process only
///
/// Same semantics as the Redis backend (TTL expiry, FIFO queues); useful for
/// tests and single-instance runs.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut inner)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.with_inner(|inner| {
            let expired = matches!(
                inner.values.get(key),
                Some((_, Some(expires_at))) if *expires_at <= Instant::now()
            );
            if expired {
                inner.values.remove(key);
                return None;
            }
            inner.values.get(key).map(|(value, _)| value.clone())
        }))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_inner(|inner| {
            inner
                .values
                .insert(key.to_string(), (value.to_string(), None));
        });
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let expires_at = Instant::now() + ttl;
        self.with_inner(|inner| {
            inner
                .values
                .insert(key.to_string(), (value.to_string(), Some(expires_at)));
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.with_inner(|inner| {
            inner.values.remove(key);
        });
        Ok(())
    }

    async fn enqueue(&self, queue: &str, value: &str) -> Result<(), StorageError> {
        self.with_inner(|inner| {
            inner
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(value.to_string());
        });
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<String>, StorageError> {
        Ok(self.with_inner(|inner| inner.queues.get_mut(queue).and_then(VecDeque::pop_front)))
    }

    async fn queue_len(&self, queue: &str) -> Result<usize, StorageError> {
        Ok(self.with_inner(|inner| inner.queues.get(queue).map_or(0, VecDeque::len)))
    }
}
