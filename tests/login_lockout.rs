mod common;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode, header::RETRY_AFTER};
use quire::application::users::{LoginCommand, LoginError, RegisterCommand, UserService};
use quire::auth::{FailedLoginTracker, LockoutPolicy, SessionAuthenticator, SessionSigner};
use quire::infra::memory::MemoryRepositories;
use serde_json::json;
use time::OffsetDateTime;

use common::{CLIENT, PASSWORD, TestApp, hasher, json_body};

const OTHER_CLIENT: &str = "198.51.100.9";

fn service(repos: &MemoryRepositories) -> UserService {
    let repo = Arc::new(repos.clone());
    let sessions = Arc::new(SessionAuthenticator::new(
        SessionSigner::from_bytes(common::SECRET.as_bytes()),
        repo.clone(),
        Duration::from_secs(3600),
    ));
    let lockout = Arc::new(FailedLoginTracker::new(
        repo.clone(),
        LockoutPolicy {
            max_failed: NonZeroU32::new(3).expect("non-zero"),
            window: Duration::from_secs(60),
        },
    ));
    UserService::new(repo.clone(), repo, lockout, sessions, hasher())
}

fn login(password: &str) -> LoginCommand {
    LoginCommand {
        username: "alice".to_string(),
        password: password.to_string(),
    }
}

async fn wrong_password(app: &TestApp, client: &str) -> axum::response::Response {
    app.send_from(
        client,
        Method::POST,
        "/v1/user/authenticate/",
        None,
        Some(json!({ "username": "alice", "password": "definitely wrong" })),
    )
    .await
}

#[tokio::test]
async fn repeated_failures_lock_out_even_the_right_password() {
    let app = TestApp::new();
    app.register("alice").await;

    for _ in 0..5 {
        let response = wrong_password(&app, CLIENT).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let locked = app
        .send(
            Method::POST,
            "/v1/user/authenticate/",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD })),
        )
        .await;
    assert_eq!(locked.status(), StatusCode::FORBIDDEN);
    let retry_after: u64 = locked
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .expect("retry-after seconds");
    assert!((1..=300).contains(&retry_after));
    assert_eq!(json_body(locked).await["error"]["code"], "locked_out");
}

#[tokio::test]
async fn lockout_is_scoped_to_the_address() {
    let app = TestApp::new();
    app.register("alice").await;

    for _ in 0..5 {
        wrong_password(&app, CLIENT).await;
    }

    let elsewhere = app
        .send_from(
            OTHER_CLIENT,
            Method::POST,
            "/v1/user/authenticate/",
            None,
            Some(json!({ "username": "alice", "password": PASSWORD })),
        )
        .await;
    assert_eq!(elsewhere.status(), StatusCode::OK);
}

#[tokio::test]
async fn window_expiry_lifts_the_lockout() {
    let repos = MemoryRepositories::new();
    let users = service(&repos);
    let start = OffsetDateTime::now_utc();

    users
        .register(
            RegisterCommand {
                username: "alice".to_string(),
                email: "alice@example.test".to_string(),
                full_name: None,
                password: PASSWORD.to_string(),
            },
            CLIENT,
            start,
        )
        .await
        .expect("registered");

    for offset in 0..3 {
        let at = start + Duration::from_secs(offset);
        let err = users
            .login(login("nope-nope"), CLIENT, at)
            .await
            .expect_err("wrong password");
        assert!(matches!(err, LoginError::InvalidCredentials));
    }

    let at = start + Duration::from_secs(10);
    match users.login(login(PASSWORD), CLIENT, at).await {
        Err(LoginError::LockedOut { retry_after }) => {
            assert_eq!(retry_after, Duration::from_secs(50));
        }
        other => panic!("expected lockout, got {other:?}"),
    }

    // The oldest failure has left the window; two remain, below the limit.
    let at = start + Duration::from_secs(61);
    let issued = users
        .login(login(PASSWORD), CLIENT, at)
        .await
        .expect("window has moved on");
    assert_eq!(issued.user.username, "alice");
    assert!(!issued.token.is_empty());
}

#[tokio::test]
async fn locked_pair_is_rejected_before_the_password_is_checked() {
    let repos = MemoryRepositories::new();
    let users = service(&repos);
    let start = OffsetDateTime::now_utc();

    users
        .register(
            RegisterCommand {
                username: "alice".to_string(),
                email: "alice@example.test".to_string(),
                full_name: None,
                password: PASSWORD.to_string(),
            },
            CLIENT,
            start,
        )
        .await
        .expect("registered");

    for _ in 0..3 {
        let _ = users.login(login("nope-nope"), CLIENT, start).await;
    }

    // A wrong password while locked is not recorded as a further failure.
    for _ in 0..3 {
        let err = users
            .login(login("nope-nope"), CLIENT, start)
            .await
            .expect_err("locked");
        assert!(matches!(err, LoginError::LockedOut { .. }));
    }

    // The window is inclusive of its start, so the last locked second is +60.
    let edge = start + Duration::from_secs(60);
    match users.login(login(PASSWORD), CLIENT, edge).await {
        Err(LoginError::LockedOut { retry_after }) => {
            assert_eq!(retry_after, Duration::from_secs(1));
        }
        other => panic!("expected lockout, got {other:?}"),
    }

    let at = start + Duration::from_secs(61);
    users
        .login(login(PASSWORD), CLIENT, at)
        .await
        .expect("every failure expired together");
}
