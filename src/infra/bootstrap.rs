//! Wiring of settings, stores, services and the router.

use std::sync::Arc;

use axum::Router;

use crate::application::posts::PostService;
use crate::application::settings::SettingsService;
use crate::application::users::UserService;
use crate::auth::{
    FailedLoginTracker, LockoutPolicy, PasswordHasher, SessionAuthenticator, SessionSigner,
};
use crate::cache::{CacheConfig, CacheState, CacheStore, PolicyRegistry};
use crate::config::Settings;

use super::error::InfraError;
use super::http::{AppState, blog_registry, build_router};
use super::memory::MemoryRepositories;

pub struct Application {
    pub router: Router,
    pub registry: Arc<PolicyRegistry>,
    pub cache: CacheState,
    pub repos: MemoryRepositories,
}

/// Open the configured cache store and assemble the application.
pub async fn build_application(settings: &Settings) -> Result<Application, InfraError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let store = cache_config.open_store().await?;
    assemble(
        settings,
        MemoryRepositories::new(),
        store,
        PasswordHasher::default(),
    )
}

/// Assemble the application from already constructed parts.
pub fn assemble(
    settings: &Settings,
    repos: MemoryRepositories,
    store: Arc<dyn CacheStore>,
    hasher: PasswordHasher,
) -> Result<Application, InfraError> {
    let registry = Arc::new(blog_registry()?);
    let repo = Arc::new(repos.clone());

    let sessions = Arc::new(SessionAuthenticator::new(
        SessionSigner::new(&settings.session.secret),
        repo.clone(),
        settings.session.max_session,
    ));
    let lockout = Arc::new(FailedLoginTracker::new(
        repo.clone(),
        LockoutPolicy::from(&settings.login),
    ));
    let users = Arc::new(UserService::new(
        repo.clone(),
        repo.clone(),
        lockout.clone(),
        sessions.clone(),
        hasher,
    ));
    let login_settings = Arc::new(SettingsService::new(lockout, sessions.clone()));
    let posts = Arc::new(PostService::new(repo));

    let state = AppState {
        posts,
        users,
        sessions,
        registry: registry.clone(),
        settings: login_settings,
        trust_forwarded_for: settings.session.trust_forwarded_for,
    };
    let cache = CacheState::new(CacheConfig::from(&settings.cache), store);
    let router = build_router(state, cache.clone())?;

    Ok(Application {
        router,
        registry,
        cache,
        repos,
    })
}
