//! Resource response cache with cascading invalidation.
//!
//! - **Policies** ([`PolicySpec`] → [`ResourceCachePolicy`]) describe, per
//!   route template, whether responses are cached, whether the key carries the
//!   query string and/or the requester identity, and which other resources
//!   must be purged when this one mutates.
//! - **Registry** ([`PolicyRegistry`]) resolves the specs once at startup into
//!   an immutable graph and rejects configuration errors before serving.
//! - **Store** ([`CacheStore`]) is the only persistent state: an in-process
//!   [`MemoryStore`] or a shared [`RedisStore`], always behind a
//!   [`TimeoutStore`] deadline.
//! - **Middleware** ([`response_cache_layer`]) reads and writes entries around
//!   each handler and runs the [`InvalidationPlan`] after mutations.
//!
//! Entries carry no TTL; they live until invalidated.
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"          # or "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! operation_timeout_ms = 250
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod planner;
mod policy;
mod redis_store;
mod registry;
mod store;
mod template;

pub use config::CacheConfig;
pub use keys::{CacheKey, KeyPrefix, build_key, normalize_uri};
pub use middleware::{
    CACHE_STATUS_HEADER, CacheIdentity, CacheState, CachedBody, PolicyCacheState,
    response_cache_layer,
};
pub use planner::{InvalidationPlan, InvalidationReport, InvalidationTarget};
pub use policy::{PolicyError, PolicySpec, ResourceCachePolicy};
pub use redis_store::RedisStore;
pub use registry::PolicyRegistry;
pub use store::{CacheStore, CacheStoreError, MemoryStore, TimeoutStore};
pub use template::{PathParams, RouteTemplate, TemplateError};
