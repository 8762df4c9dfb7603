#![allow(dead_code)]

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use quire::application::repos::UsersRepo;
use quire::auth::PasswordHasher;
use quire::cache::{CACHE_STATUS_HEADER, CacheStore, MemoryStore};
use quire::config::{
    CacheBackendKind, CacheSettings, LogFormat, LoggingSettings, LoginSettings, ServerSettings,
    SessionSecret, SessionSettings, Settings,
};
use quire::domain::users::{UserRecord, UserRole};
use quire::infra::bootstrap::{Application, assemble};
use quire::infra::memory::MemoryRepositories;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tower::ServiceExt;
use tracing::level_filters::LevelFilter;
use uuid::Uuid;

pub const SECRET: &str = "integration-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct horse battery";
pub const CLIENT: &str = "203.0.113.7";

pub fn settings() -> Settings {
    Settings {
        server: ServerSettings {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            graceful_shutdown: Duration::from_secs(1),
        },
        logging: LoggingSettings {
            level: LevelFilter::WARN,
            format: LogFormat::Compact,
        },
        cache: CacheSettings {
            enabled: true,
            backend: CacheBackendKind::Memory,
            operation_timeout: Duration::from_millis(250),
            max_body_bytes: 1024 * 1024,
        },
        session: SessionSettings {
            secret: SessionSecret::new(SECRET).expect("secret"),
            max_session: Duration::from_secs(3600),
            trust_forwarded_for: true,
        },
        login: LoginSettings {
            max_failed_login: NonZeroU32::new(5).expect("non-zero"),
            failed_login_timeout: Duration::from_secs(300),
        },
    }
}

pub fn hasher() -> PasswordHasher {
    PasswordHasher::with_cost(8, 1, 1).expect("cheap params")
}

pub struct TestApp<S = MemoryStore> {
    pub app: Application,
    pub store: Arc<S>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::with_store(settings, Arc::new(MemoryStore::new()))
    }
}

impl<S: CacheStore + 'static> TestApp<S> {
    pub fn with_store(settings: Settings, store: Arc<S>) -> Self {
        let app = assemble(&settings, MemoryRepositories::new(), store.clone(), hasher())
            .expect("application assembles");
        Self { app, store }
    }

    pub fn router(&self) -> Router {
        self.app.router.clone()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        self.send_from(CLIENT, method, uri, token, body).await
    }

    pub async fn send_from(
        &self,
        client: &str,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", client);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(payload) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        self.router()
            .oneshot(request)
            .await
            .expect("router responds")
    }

    /// Register `username` and return its session token.
    pub async fn register(&self, username: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/v1/user/register/",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.test"),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        token_of(response).await
    }

    /// Insert a user with `role` straight into the directory.
    pub async fn seed_user(&self, username: &str, role: UserRole) {
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.test"),
            full_name: None,
            password_hash: hasher().hash(PASSWORD).expect("hash"),
            role,
            created_at: OffsetDateTime::now_utc(),
            last_activity: None,
        };
        UsersRepo::insert(&self.app.repos, user)
            .await
            .expect("seeded");
    }

    pub async fn login(&self, username: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/v1/user/authenticate/",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        token_of(response).await
    }

    /// Create a public post and return its canonical href.
    pub async fn create_post(&self, token: &str, title: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/v1/posts/",
                Some(token),
                Some(json!({
                    "title": title,
                    "content": format!("{title} body"),
                    "tags": ["rust"],
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location header")
            .to_string()
    }
}

pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn token_of(response: Response) -> String {
    json_body(response)
        .await
        .get("token")
        .and_then(Value::as_str)
        .expect("token field")
        .to_string()
}

pub fn cache_status(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
