//! Route table and cache policy graph.
//!
//! Each resource is mounted with its own middleware stack, composed once
//! here: access guard, then response cache, then the handler. The session
//! layer wraps the whole router.

use axum::{
    Router,
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::{MethodRouter, get, post, put},
};

use crate::auth::AccessRule;
use crate::cache::{
    CacheState, PolicyError, PolicyRegistry, PolicySpec, normalize_uri, response_cache_layer,
};

use super::error::ApiError;
use super::handlers::{posts, service, users};
use super::middleware::{
    MethodAccess, access_guard, log_responses, session_layer, set_request_context,
};
use super::state::AppState;

pub const SERVICE: &str = "service";
pub const POSTS: &str = "posts";
pub const POST_SEARCH: &str = "post_search";
pub const POST: &str = "post";
pub const POST_COMMENT: &str = "post_comment";
pub const POST_LIKE: &str = "post_like";
pub const POST_VIEW: &str = "post_view";
pub const USER_AUTHENTICATE: &str = "user_authenticate";
pub const USER_REGISTER: &str = "user_register";
pub const USER: &str = "user";
pub const ADMIN_SETTINGS: &str = "admin_settings";

/// Cache policies for every blog resource.
pub fn blog_policies() -> Vec<PolicySpec> {
    vec![
        PolicySpec::uncached(SERVICE, "/"),
        PolicySpec::cached(POSTS, "/v1/posts/")
            .with_query()
            .invalidates(&[POST_SEARCH, USER]),
        PolicySpec::cached(POST_SEARCH, "/v1/posts/search")
            .per_identity()
            .with_query(),
        PolicySpec::cached(POST, "/v1/post/{post_id}/").invalidates(&[POSTS, POST_SEARCH, USER]),
        PolicySpec::cached(POST_COMMENT, "/v1/post/{post_id}/comment")
            .invalidates(&[POST, POSTS, POST_SEARCH, USER]),
        PolicySpec::cached(POST_LIKE, "/v1/post/{post_id}/like")
            .invalidates(&[POST, POSTS, POST_SEARCH, USER]),
        PolicySpec::cached(POST_VIEW, "/v1/post/{post_id}/view")
            .invalidates(&[POST, POSTS, POST_SEARCH, USER]),
        PolicySpec::uncached(USER_AUTHENTICATE, "/v1/user/authenticate/"),
        PolicySpec::uncached(USER_REGISTER, "/v1/user/register/"),
        PolicySpec::cached(USER, "/v1/user/").per_identity(),
        PolicySpec::uncached(ADMIN_SETTINGS, "/v1/blog/admin/settings"),
    ]
}

pub fn blog_registry() -> Result<PolicyRegistry, PolicyError> {
    PolicyRegistry::build(blog_policies())
}

struct Mounter<'a> {
    router: Router<AppState>,
    registry: &'a PolicyRegistry,
    cache: &'a CacheState,
}

impl Mounter<'_> {
    /// Mount `methods` at the resource's template and at its form without
    /// a trailing slash.
    fn mount(
        mut self,
        resource: &'static str,
        methods: MethodRouter<AppState>,
        access: MethodAccess,
    ) -> Result<Self, PolicyError> {
        let policy = self
            .registry
            .get(resource)
            .ok_or(PolicyError::Unregistered { resource })?;
        let template = policy.template().as_str().to_string();

        let methods = methods
            .route_layer(from_fn_with_state(
                self.cache.for_policy(policy),
                response_cache_layer,
            ))
            .route_layer(from_fn_with_state(access, access_guard));

        let stripped = normalize_uri(&template);
        if !stripped.is_empty() && stripped != template {
            self.router = self.router.route(stripped, methods.clone());
        }
        self.router = self.router.route(&template, methods);
        Ok(self)
    }
}

fn authenticated(methods: &[Method]) -> MethodAccess {
    methods
        .iter()
        .fold(MethodAccess::new(), |access, method| {
            access.require(method.clone(), AccessRule::Authenticated)
        })
}

pub fn build_router(state: AppState, cache: CacheState) -> Result<Router, PolicyError> {
    let registry = state.registry.clone();
    let mounter = Mounter {
        router: Router::new(),
        registry: &registry,
        cache: &cache,
    };

    let router = mounter
        .mount(SERVICE, get(service::describe), MethodAccess::new())?
        .mount(
            POSTS,
            get(posts::list_posts).post(posts::create_post),
            authenticated(&[Method::POST]),
        )?
        .mount(
            POST_SEARCH,
            get(posts::search_posts),
            authenticated(&[Method::GET]),
        )?
        .mount(
            POST,
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
            authenticated(&[Method::PUT, Method::DELETE]),
        )?
        .mount(
            POST_COMMENT,
            post(posts::comment_post),
            authenticated(&[Method::POST]),
        )?
        .mount(
            POST_LIKE,
            put(posts::like_post),
            authenticated(&[Method::PUT]),
        )?
        .mount(
            POST_VIEW,
            put(posts::view_post),
            authenticated(&[Method::PUT]),
        )?
        .mount(
            USER_AUTHENTICATE,
            post(users::authenticate),
            MethodAccess::new(),
        )?
        .mount(
            USER_REGISTER,
            post(users::register),
            MethodAccess::new().require(Method::POST, AccessRule::Anonymous),
        )?
        .mount(
            USER,
            get(users::profile).put(users::update_profile),
            authenticated(&[Method::GET, Method::PUT]),
        )?
        .mount(
            ADMIN_SETTINGS,
            get(service::admin_settings).put(service::update_admin_settings),
            MethodAccess::new()
                .require(Method::GET, AccessRule::Admin)
                .require(Method::PUT, AccessRule::Admin),
        )?
        .router;

    Ok(router
        .fallback(|| async { ApiError::not_found("Route not found") })
        .layer(from_fn_with_state(state.clone(), session_layer))
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InvalidationPlan, InvalidationTarget, PathParams};

    #[test]
    fn blog_graph_is_valid() {
        let registry = blog_registry().expect("valid graph");
        assert_eq!(registry.len(), blog_policies().len());
    }

    /// Exact keys and prefixes purged by a mutation on post 42.
    fn post_cascade(resource: &str, path: &str) -> (Vec<String>, Vec<String>) {
        let registry = blog_registry().expect("valid graph");
        let policy = registry.get(resource).expect("registered");
        let params: PathParams = [("post_id".to_string(), "42".to_string())].into();
        let plan = InvalidationPlan::for_mutation(&policy, path, &params, None);

        let mut exact = Vec::new();
        let mut prefixes = Vec::new();
        for target in plan.targets() {
            match target {
                InvalidationTarget::Exact(key) => exact.push(key.as_str().to_string()),
                InvalidationTarget::Prefix(prefix) => prefixes.push(prefix.as_str().to_string()),
            }
        }
        exact.sort();
        prefixes.sort();
        (exact, prefixes)
    }

    #[test]
    fn post_like_cascade_covers_every_view_of_the_post() {
        let (exact, prefixes) = post_cascade(POST_LIKE, "/v1/post/42/like");
        assert_eq!(exact, vec!["/v1/post/42", "/v1/post/42/like"]);
        assert_eq!(prefixes, vec!["/v1/posts", "/v1/posts/search", "/v1/user"]);
    }

    #[test]
    fn post_view_cascade_reaches_profiles() {
        let (exact, prefixes) = post_cascade(POST_VIEW, "/v1/post/42/view");
        assert_eq!(exact, vec!["/v1/post/42", "/v1/post/42/view"]);
        assert_eq!(prefixes, vec!["/v1/posts", "/v1/posts/search", "/v1/user"]);
    }

    #[test]
    fn every_post_mutation_purges_profiles() {
        let registry = blog_registry().expect("valid graph");
        for resource in [POSTS, POST, POST_COMMENT, POST_LIKE, POST_VIEW] {
            let policy = registry.get(resource).expect("registered");
            assert!(
                policy.dependents().iter().any(|dep| dep.name() == USER),
                "{resource} leaves cached profiles stale"
            );
        }
    }
}
