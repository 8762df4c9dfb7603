//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};

use super::keys::{CacheKey, KeyPrefix};
use super::store::{CacheStore, CacheStoreError};

const SCAN_BATCH: usize = 200;

pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Build a pool for `url` and check that one connection can be opened.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CacheStoreError> {
        let mut config = Config::from_url(url);
        if let Some(ref mut pool_config) = config.pool {
            pool_config.timeouts.wait = Some(timeout);
            pool_config.timeouts.create = Some(timeout);
            pool_config.timeouts.recycle = Some(timeout);
        }

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(CacheStoreError::unavailable)?;
        pool.get().await.map_err(CacheStoreError::unavailable)?;

        info!(target = "quire::cache", "Connected to redis cache store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<Connection, CacheStoreError> {
        self.pool.get().await.map_err(CacheStoreError::unavailable)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheStoreError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn
            .get(key.as_str())
            .await
            .map_err(CacheStoreError::backend)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &CacheKey, value: Bytes) -> Result<(), CacheStoreError> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key.as_str(), value.as_ref())
            .await
            .map_err(CacheStoreError::backend)
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheStoreError> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .del(key.as_str())
            .await
            .map_err(CacheStoreError::backend)?;
        Ok(removed > 0)
    }

    async fn scan(&self, prefix: &KeyPrefix) -> Result<Vec<CacheKey>, CacheStoreError> {
        let mut conn = self.connection().await?;
        let pattern = scan_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(CacheStoreError::backend)?;

            keys.extend(
                batch
                    .into_iter()
                    .filter(|key| prefix.covers(key))
                    .map(CacheKey::new),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(
            target = "quire::cache",
            prefix = %prefix,
            matched = keys.len(),
            "redis scan complete"
        );
        Ok(keys)
    }
}

/// `SCAN MATCH` pattern selecting every key that starts with `prefix`.
fn scan_pattern(prefix: &KeyPrefix) -> String {
    let mut pattern = String::with_capacity(prefix.as_str().len() + 1);
    for ch in prefix.as_str().chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}
