// Non-blocking distributed locking
//
// A lock is a lease: acquired with SET NX EX semantics, identified by a
// random token, released by check-and-delete, and expired by TTL when the
// holder dies. Acquisition never waits.

use crate::cache::RedisPool;
use crate::errors::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Distributed lock trait: try-acquire a named lock, non-blocking
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to acquire `resource` once. `Ok(None)` means someone else holds it.
    async fn try_acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<LockLease>, StorageError>;

    /// Release a lease. Returns false if it had already expired or been taken over.
    async fn release(&self, lease: LockLease) -> Result<bool, StorageError>;
}

/// Proof of ownership of a lock until `ttl` elapses
#[derive(Debug)]
pub struct LockLease {
    resource: String,
    token: String,
    acquired_at: Instant,
    ttl: Duration,
}

impl LockLease {
    fn new(resource: &str, ttl: Duration) -> Self {
        Self {
            resource: resource.to_string(),
            token: Uuid::new_v4().to_string(),
            acquired_at: Instant::now(),
            ttl,
        }
    }

    /// Get the resource name this lease guards
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Get the time elapsed since lock acquisition
    pub fn elapsed(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Whether the TTL has run out on our side
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.ttl
    }
}

fn lock_key(resource: &str) -> String {
    format!("lock:{}", resource)
}

/// Redis-backed lock
pub struct RedLock {
    pool: RedisPool,
}

impl RedLock {
    /// Create a new RedLock instance
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DistributedLock for RedLock {
    #[instrument(skip(self), fields(resource = %resource, ttl_seconds = ttl.as_secs()))]
    async fn try_acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<LockLease>, StorageError> {
        let mut conn = self.pool.connection();
        let lease = LockLease::new(resource, ttl);

        // SET NX EX atomically sets the key only if it doesn't exist
        let result: Option<String> = redis::cmd("SET")
            .arg(lock_key(resource))
            .arg(&lease.token)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::RedisError(format!("Failed to acquire lock: {}", e)))?;

        if result.is_some() {
            debug!("Lock acquired");
            Ok(Some(lease))
        } else {
            debug!("Lock already held");
            Ok(None)
        }
    }

    #[instrument(skip(self, lease), fields(resource = %lease.resource))]
    async fn release(&self, lease: LockLease) -> Result<bool, StorageError> {
        let mut conn = self.pool.connection();

        // Only delete the lock if we still own it
        let script = r#"
            if redis.call("get", KEYS[1]) == ARGV[1] then
                return redis.call("del", KEYS[1])
            else
                return 0
            end
        "#;

        let result: i32 = redis::Script::new(script)
            .key(lock_key(&lease.resource))
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StorageError::RedisError(format!("Failed to release lock: {}", e)))?;

        if result == 1 {
            debug!("Lock released");
            Ok(true)
        } else {
            warn!(
                held_for_ms = lease.elapsed().as_millis() as u64,
                "Lock was not owned or already expired"
            );
            Ok(false)
        }
    }
}

/// Single-process lock with the same lease semantics
#[derive(Default)]
pub struct InMemoryLock {
    held: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `resource` is currently held by anyone
    pub fn is_held(&self, resource: &str) -> bool {
        let held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        held.get(resource)
            .map(|(_, expires_at)| *expires_at > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn try_acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<LockLease>, StorageError> {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        let now = Instant::now();

        if let Some((_, expires_at)) = held.get(resource) {
            if *expires_at > now {
                return Ok(None);
            }
        }

        let lease = LockLease::new(resource, ttl);
        held.insert(resource.to_string(), (lease.token.clone(), now + ttl));
        Ok(Some(lease))
    }

    async fn release(&self, lease: LockLease) -> Result<bool, StorageError> {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        match held.get(&lease.resource) {
            Some((token, _)) if *token == lease.token => {
                held.remove(&lease.resource);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
