//! Cache storage backends.
//!
//! The store is the only persistent state of the cache layer. Every operation
//! is independent and atomic on its own; callers never hold anything across
//! two calls.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::keys::{CacheKey, KeyPrefix};
use super::lock::{rw_read, rw_write};

#[derive(Debug, Clone, Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store `{op}` timed out after {after_ms}ms")]
    Timeout { op: &'static str, after_ms: u64 },
    #[error("cache store command failed: {0}")]
    Backend(String),
}

impl CacheStoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key/value store with prefix scans.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheStoreError>;

    async fn set(&self, key: &CacheKey, value: Bytes) -> Result<(), CacheStoreError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheStoreError>;

    /// Keys belonging to `prefix`, as defined by [`KeyPrefix::covers`].
    async fn scan(&self, prefix: &KeyPrefix) -> Result<Vec<CacheKey>, CacheStoreError>;
}

/// In-process store backed by an ordered map.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "memory.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        rw_read(&self.entries, "memory.keys")
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheStoreError> {
        Ok(rw_read(&self.entries, "memory.get")
            .get(key.as_str())
            .cloned())
    }

    async fn set(&self, key: &CacheKey, value: Bytes) -> Result<(), CacheStoreError> {
        rw_write(&self.entries, "memory.set").insert(key.as_str().to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheStoreError> {
        Ok(rw_write(&self.entries, "memory.delete")
            .remove(key.as_str())
            .is_some())
    }

    async fn scan(&self, prefix: &KeyPrefix) -> Result<Vec<CacheKey>, CacheStoreError> {
        let entries = rw_read(&self.entries, "memory.scan");
        let start = Bound::Included(prefix.as_str().to_string());
        Ok(entries
            .range::<String, _>((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix.as_str()))
            .filter(|key| prefix.covers(key))
            .map(|key| CacheKey::new(key.clone()))
            .collect())
    }
}

/// Bounds every call on the inner store by a deadline.
pub struct TimeoutStore {
    inner: Arc<dyn CacheStore>,
    limit: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn CacheStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CacheStoreError>
    where
        F: std::future::Future<Output = Result<T, CacheStoreError>> + Send,
    {
        tokio::time::timeout(self.limit, fut)
            .await
            .unwrap_or_else(|_| {
                Err(CacheStoreError::Timeout {
                    op,
                    after_ms: self.limit.as_millis() as u64,
                })
            })
    }
}

#[async_trait]
impl CacheStore for TimeoutStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheStoreError> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn set(&self, key: &CacheKey, value: Bytes) -> Result<(), CacheStoreError> {
        self.bounded("set", self.inner.set(key, value)).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheStoreError> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    async fn scan(&self, prefix: &KeyPrefix) -> Result<Vec<CacheKey>, CacheStoreError> {
        self.bounded("scan", self.inner.scan(prefix)).await
    }
}
