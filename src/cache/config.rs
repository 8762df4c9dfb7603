//! Cache configuration.
//!
//! Derived from the `[cache]` section of the settings; also owns store
//! construction so callers only see `Arc<dyn CacheStore>`.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackendKind, CacheSettings};

use super::redis_store::RedisStore;
use super::store::{CacheStore, CacheStoreError, MemoryStore, TimeoutStore};

const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 250;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch; when off the middleware is a pass-through.
    pub enabled: bool,
    pub backend: CacheBackendKind,
    /// Deadline applied to every store call.
    pub operation_timeout: Duration,
    /// Responses larger than this, or streamed without a known length, are
    /// passed through uncached.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend.clone(),
            operation_timeout: settings.operation_timeout,
            max_body_bytes: settings.max_body_bytes,
        }
    }
}

impl CacheConfig {
    /// Open the configured backend, wrapped in the operation deadline.
    pub async fn open_store(&self) -> Result<Arc<dyn CacheStore>, CacheStoreError> {
        let inner: Arc<dyn CacheStore> = match &self.backend {
            CacheBackendKind::Memory => Arc::new(MemoryStore::new()),
            CacheBackendKind::Redis { url } => {
                Arc::new(RedisStore::connect(url, self.operation_timeout).await?)
            }
        };
        Ok(Arc::new(TimeoutStore::new(inner, self.operation_timeout)))
    }
}
