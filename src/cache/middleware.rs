//! Response cache middleware.
//!
//! Attached per route with the route's [`ResourceCachePolicy`]. Before the
//! handler runs it looks the key up and stashes a hit as [`CachedBody`]; the
//! handler is always executed and decides whether to reuse the stash. After a
//! successful response a read stores the body and a mutation runs the
//! invalidation cascade.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header::CONTENT_LENGTH, response::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::counter;
use tracing::{debug, error, instrument, warn};

use super::{
    CacheConfig,
    keys::{CacheKey, build_key},
    planner::InvalidationPlan,
    policy::ResourceCachePolicy,
    store::CacheStore,
};

pub const CACHE_STATUS_HEADER: &str = "x-quire-cache";

const METRIC_HIT: &str = "quire_cache_hit_total";
const METRIC_MISS: &str = "quire_cache_miss_total";
const METRIC_STORE_ERROR: &str = "quire_cache_store_error_total";

/// Shared cache state: configuration and the store handle.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<dyn CacheStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self { config, store }
    }

    /// Bind the shared state to one resource's policy.
    pub fn for_policy(&self, policy: Arc<ResourceCachePolicy>) -> PolicyCacheState {
        PolicyCacheState {
            cache: self.clone(),
            policy,
        }
    }
}

/// Middleware state for a single route.
#[derive(Clone)]
pub struct PolicyCacheState {
    pub cache: CacheState,
    pub policy: Arc<ResourceCachePolicy>,
}

/// Body found in the cache before the handler ran.
#[derive(Debug, Clone)]
pub struct CachedBody(pub Bytes);

/// Stable identity the cache keys per-identity resources by.
///
/// Inserted into request extensions by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheIdentity(pub String);

fn is_read(method: &Method) -> bool {
    *method == Method::GET
}

fn is_mutation(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

#[instrument(skip_all, fields(resource = state.policy.name(), path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(state): State<PolicyCacheState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let PolicyCacheState { cache, policy } = state;

    if !cache.config.enabled || !policy.cacheable() {
        return next.run(request).await;
    }

    let method = request.method().clone();
    if !is_read(&method) && !is_mutation(&method) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let identity = request
        .extensions()
        .get::<CacheIdentity>()
        .map(|identity| identity.0.clone());
    let key = build_key(
        &path,
        &policy,
        request.uri().query(),
        identity.as_deref(),
    );

    if is_mutation(&method) {
        let response = next.run(request).await;
        if response.status().is_success() {
            let params = policy.template().match_path(&path).unwrap_or_default();
            let plan = InvalidationPlan::for_mutation(&policy, &path, &params, identity.as_deref());
            plan.execute(cache.store.as_ref()).await;
        }
        return response;
    }

    let cached = lookup(cache.store.as_ref(), &key).await;
    if let Some(body) = cached.as_ref() {
        request.extensions_mut().insert(CachedBody(body.clone()));
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Some(len) = collectable_len(&parts, &body, cache.config.max_body_bytes) else {
        warn!(
            target = "quire::cache",
            key = %key,
            limit = cache.config.max_body_bytes,
            "response body unbounded or over the cache limit; served uncached"
        );
        parts
            .headers
            .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("miss"));
        return Response::from_parts(parts, body);
    };
    let bytes = match axum::body::to_bytes(body, len).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The body stream itself failed; there is nothing left to serve.
            error!(
                target = "quire::cache",
                key = %key,
                error = %err,
                "response body failed while collecting"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let (bytes, served_from_cache) = match (bytes.is_empty(), cached) {
        // The handler deferred to the stash; keep serving it.
        (true, Some(previous)) => (previous, true),
        (_, previous) => (bytes, previous.is_some()),
    };

    if !bytes.is_empty() {
        store_body(cache.store.as_ref(), &key, bytes.clone()).await;
    }

    parts.headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(if served_from_cache { "hit" } else { "miss" }),
    );
    Response::from_parts(parts, Body::from(bytes))
}

/// Exact upper bound of the body when it fits the cache limit.
///
/// Both the body's size hint and `Content-Length` must agree it fits; a
/// streamed body without a known bound is never collected.
fn collectable_len(parts: &Parts, body: &Body, limit: usize) -> Option<usize> {
    let declared = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    let upper = body.size_hint().upper()?;
    let len = declared.map_or(upper, |declared| declared.max(upper));
    usize::try_from(len).ok().filter(|len| *len <= limit)
}

async fn lookup(store: &dyn CacheStore, key: &CacheKey) -> Option<Bytes> {
    match store.get(key).await {
        Ok(Some(body)) => {
            debug!(target = "quire::cache", key = %key, outcome = "hit", "cache lookup");
            counter!(METRIC_HIT).increment(1);
            Some(body)
        }
        Ok(None) => {
            debug!(target = "quire::cache", key = %key, outcome = "miss", "cache lookup");
            counter!(METRIC_MISS).increment(1);
            None
        }
        Err(err) => {
            warn!(
                target = "quire::cache",
                key = %key,
                error = %err,
                "cache read failed; treating as miss"
            );
            counter!(METRIC_STORE_ERROR, "op" => "get").increment(1);
            counter!(METRIC_MISS).increment(1);
            None
        }
    }
}

async fn store_body(store: &dyn CacheStore, key: &CacheKey, body: Bytes) {
    if let Err(err) = store.set(key, body).await {
        warn!(
            target = "quire::cache",
            key = %key,
            error = %err,
            "cache write failed; response served uncached"
        );
        counter!(METRIC_STORE_ERROR, "op" => "set").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        Extension, Router,
        extract::Path,
        middleware,
        routing::{get, put},
    };
    use tower::ServiceExt;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{CacheStoreError, KeyPrefix, MemoryStore, PolicyRegistry, PolicySpec};

    fn registry() -> PolicyRegistry {
        PolicyRegistry::build(vec![
            PolicySpec::cached("posts", "/v1/posts/").with_query(),
            PolicySpec::cached("post", "/v1/post/{post_id}/").invalidates(&["posts"]),
            PolicySpec::uncached("service", "/"),
        ])
        .expect("valid graph")
    }

    fn state(store: Arc<MemoryStore>) -> CacheState {
        CacheState::new(CacheConfig::default(), store)
    }

    async fn send(app: &Router, method: Method, uri: &str) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response")
    }

    fn post_router(cache: CacheState, calls: Arc<AtomicUsize>) -> Router {
        let registry = registry();
        let post = cache.for_policy(registry.get("post").expect("post"));
        let read_calls = calls.clone();
        Router::new().route(
            "/v1/post/{post_id}/",
            get(move |Path(id): Path<String>| {
                let calls = read_calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    format!("post {id} v{n}")
                }
            })
            .put(|| async { StatusCode::NO_CONTENT })
            .route_layer(middleware::from_fn_with_state(post, response_cache_layer)),
        )
    }

    #[tokio::test]
    async fn second_read_is_marked_as_hit() {
        let store = Arc::new(MemoryStore::new());
        let app = post_router(state(store.clone()), Arc::new(AtomicUsize::new(0)));

        let first = send(&app, Method::GET, "/v1/post/42/").await;
        assert_eq!(first.headers()[CACHE_STATUS_HEADER], "miss");

        let second = send(&app, Method::GET, "/v1/post/42/").await;
        assert_eq!(second.headers()[CACHE_STATUS_HEADER], "hit");
        assert_eq!(store.keys(), vec!["/v1/post/42".to_string()]);
    }

    #[tokio::test]
    async fn mutation_clears_own_entry() {
        let store = Arc::new(MemoryStore::new());
        let app = post_router(state(store.clone()), Arc::new(AtomicUsize::new(0)));

        send(&app, Method::GET, "/v1/post/42/").await;
        assert_eq!(store.len(), 1);

        let put = send(&app, Method::PUT, "/v1/post/42/").await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);
        assert!(store.is_empty());

        let after = send(&app, Method::GET, "/v1/post/42/").await;
        assert_eq!(after.headers()[CACHE_STATUS_HEADER], "miss");
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let registry = registry();
        let store = Arc::new(MemoryStore::new());
        store
            .set(&CacheKey::new("/v1/post/42"), Bytes::from_static(b"cached"))
            .await
            .expect("seed");
        let post = state(store.clone()).for_policy(registry.get("post").expect("post"));
        let app = Router::new().route(
            "/v1/post/{post_id}/",
            put(|| async { StatusCode::FORBIDDEN })
                .route_layer(middleware::from_fn_with_state(post, response_cache_layer)),
        );

        let put = send(&app, Method::PUT, "/v1/post/42/").await;
        assert_eq!(put.status(), StatusCode::FORBIDDEN);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn empty_handler_body_falls_back_to_cached_body() {
        let registry = registry();
        let store = Arc::new(MemoryStore::new());
        store
            .set(&CacheKey::new("/v1/post/42"), Bytes::from_static(b"cached"))
            .await
            .expect("seed");
        let post = state(store.clone()).for_policy(registry.get("post").expect("post"));
        let app = Router::new().route(
            "/v1/post/{post_id}/",
            get(|cached: Option<Extension<CachedBody>>| async move {
                assert!(cached.is_some());
                StatusCode::OK
            })
            .route_layer(middleware::from_fn_with_state(post, response_cache_layer)),
        );

        let response = send(&app, Method::GET, "/v1/post/42/").await;
        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "hit");
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(body, Bytes::from_static(b"cached"));
    }

    #[tokio::test]
    async fn uncached_policy_is_pass_through() {
        let registry = registry();
        let store = Arc::new(MemoryStore::new());
        let service = state(store.clone()).for_policy(registry.get("service").expect("service"));
        let app = Router::new().route(
            "/",
            get(|| async { "hello" })
                .route_layer(middleware::from_fn_with_state(service, response_cache_layer)),
        );

        let response = send(&app, Method::GET, "/").await;
        assert!(response.headers().get(CACHE_STATUS_HEADER).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_is_pass_through() {
        let registry = registry();
        let store = Arc::new(MemoryStore::new());
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let post = CacheState::new(config, store.clone()).for_policy(registry.get("post").expect("post"));
        let app = Router::new().route(
            "/v1/post/{post_id}/",
            get(|| async { "body" })
                .route_layer(middleware::from_fn_with_state(post, response_cache_layer)),
        );

        send(&app, Method::GET, "/v1/post/42/").await;
        assert!(store.is_empty());
    }

    async fn body_of(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body")
    }

    #[tokio::test]
    async fn oversized_body_is_served_uncached() {
        let registry = registry();
        let store = Arc::new(MemoryStore::new());
        let config = CacheConfig {
            max_body_bytes: 16,
            ..CacheConfig::default()
        };
        let posts = CacheState::new(config, store.clone())
            .for_policy(registry.get("posts").expect("posts"));
        let app = Router::new().route(
            "/v1/posts/",
            get(|| async { "x".repeat(64) })
                .route_layer(middleware::from_fn_with_state(posts, response_cache_layer)),
        );

        let response = send(&app, Method::GET, "/v1/posts/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "miss");
        assert_eq!(body_of(response).await.len(), 64);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn streamed_body_without_length_is_served_uncached() {
        let registry = registry();
        let store = Arc::new(MemoryStore::new());
        let post = state(store.clone()).for_policy(registry.get("post").expect("post"));
        let app = Router::new().route(
            "/v1/post/{post_id}/",
            get(|| async {
                let chunks = futures::stream::iter([
                    Ok::<_, std::io::Error>(Bytes::from_static(b"streamed ")),
                    Ok(Bytes::from_static(b"body")),
                ]);
                Body::from_stream(chunks)
            })
            .route_layer(middleware::from_fn_with_state(post, response_cache_layer)),
        );

        let response = send(&app, Method::GET, "/v1/post/42/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, Bytes::from_static(b"streamed body"));
        assert!(store.is_empty());
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &CacheKey) -> Result<Option<Bytes>, CacheStoreError> {
            Err(CacheStoreError::unavailable("down"))
        }

        async fn set(&self, _key: &CacheKey, _value: Bytes) -> Result<(), CacheStoreError> {
            Err(CacheStoreError::unavailable("down"))
        }

        async fn delete(&self, _key: &CacheKey) -> Result<bool, CacheStoreError> {
            Err(CacheStoreError::Timeout {
                op: "delete",
                after_ms: 250,
            })
        }

        async fn scan(&self, _prefix: &KeyPrefix) -> Result<Vec<CacheKey>, CacheStoreError> {
            Err(CacheStoreError::unavailable("down"))
        }
    }

    #[tokio::test]
    async fn store_outage_never_reaches_the_client() {
        let cache = CacheState::new(CacheConfig::default(), Arc::new(BrokenStore));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = post_router(cache, calls.clone());

        for expected in ["post 42 v0", "post 42 v1"] {
            let read = send(&app, Method::GET, "/v1/post/42/").await;
            assert_eq!(read.status(), StatusCode::OK);
            assert_eq!(read.headers()[CACHE_STATUS_HEADER], "miss");
            assert_eq!(body_of(read).await, Bytes::from(expected));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let put = send(&app, Method::PUT, "/v1/post/42/").await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);
    }
}
