use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    application::error::ErrorReport,
    auth::{AccessRule, SessionState, observed_address},
    cache::CacheIdentity,
    domain::users::UserRecord,
};

use super::{error::ApiError, state::AppState};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Address the session is bound to and the lockout is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

/// Authenticated user, present only when the session resolved to one.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<UserRecord>);

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "quire::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "quire::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

/// Resolve the bearer token into a [`SessionState`] for every request.
///
/// Inserts the state, the observed [`ClientAddress`] and, for signed-in
/// users, [`CurrentUser`] and the [`CacheIdentity`] used by per-identity
/// cache keys. A presented but invalid token is rejected outright.
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let address = observed_address(request.headers(), peer, state.trust_forwarded_for);
    let token = extract_token(request.headers().get(AUTHORIZATION));

    let session = match state
        .sessions
        .authenticate(token.as_deref(), &address)
        .await
    {
        Ok(session) => session,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let extensions = request.extensions_mut();
    if let SessionState::Authenticated(user) = &session {
        extensions.insert(CacheIdentity(user.id.to_string()));
        extensions.insert(CurrentUser(user.clone()));
    }
    extensions.insert(session);
    extensions.insert(ClientAddress(address));

    next.run(request).await
}

/// Access rules keyed by method for a single route.
#[derive(Debug, Clone, Default)]
pub struct MethodAccess {
    rules: Vec<(Method, AccessRule)>,
}

impl MethodAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, method: Method, rule: AccessRule) -> Self {
        self.rules.push((method, rule));
        self
    }

    pub fn rule_for(&self, method: &Method) -> Option<AccessRule> {
        self.rules
            .iter()
            .find(|(candidate, _)| candidate == method)
            .map(|(_, rule)| *rule)
    }
}

pub async fn access_guard(
    State(access): State<MethodAccess>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(rule) = access.rule_for(request.method()) else {
        return next.run(request).await;
    };

    let session = request
        .extensions()
        .get::<SessionState>()
        .cloned()
        .unwrap_or(SessionState::Anonymous);

    match rule.check(&session) {
        Ok(()) => next.run(request).await,
        Err(denied) => ApiError::from(denied).into_response(),
    }
}

/// Raw token from `Authorization`, with or without a `Bearer ` prefix.
fn extract_token(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then(|| token.to_string())
}
