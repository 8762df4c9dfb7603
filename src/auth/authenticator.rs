use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::users::UserRecord;

use super::session::{SessionClaims, SessionError, SessionSigner};

const METRIC_REJECTED: &str = "quire_auth_rejected_total";

/// Outcome of authenticating one request.
#[derive(Debug, Clone)]
pub enum SessionState {
    Anonymous,
    Authenticated(Arc<UserRecord>),
}

impl SessionState {
    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error(transparent)]
    InvalidToken(#[from] SessionError),
    #[error("session is bound to another address")]
    HostMismatch,
    #[error("session expired")]
    Expired,
    #[error("session refers to an unknown user")]
    UnknownUser,
    #[error("user directory unavailable")]
    Directory(#[source] RepoError),
}

impl AuthenticationError {
    /// Stable label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthenticationError::InvalidToken(_) => "invalid_token",
            AuthenticationError::HostMismatch => "host_mismatch",
            AuthenticationError::Expired => "expired",
            AuthenticationError::UnknownUser => "unknown_user",
            AuthenticationError::Directory(_) => "directory",
        }
    }
}

pub struct SessionAuthenticator {
    signer: SessionSigner,
    users: Arc<dyn UsersRepo>,
    max_session: Duration,
}

impl SessionAuthenticator {
    pub fn new(signer: SessionSigner, users: Arc<dyn UsersRepo>, max_session: Duration) -> Self {
        Self {
            signer,
            users,
            max_session,
        }
    }

    pub fn max_session(&self) -> Duration {
        self.max_session
    }

    /// Sign a fresh token for `user`, bound to the requester's address.
    pub fn issue_for(
        &self,
        user: &UserRecord,
        observed_host: &str,
        now: OffsetDateTime,
    ) -> Result<String, SessionError> {
        self.signer.issue(&SessionClaims {
            user_id: user.id,
            issued_at: now,
            bound_host: observed_host.to_string(),
        })
    }

    pub async fn authenticate(
        &self,
        token: Option<&str>,
        observed_host: &str,
    ) -> Result<SessionState, AuthenticationError> {
        self.authenticate_at(token, observed_host, OffsetDateTime::now_utc())
            .await
    }

    pub async fn authenticate_at(
        &self,
        token: Option<&str>,
        observed_host: &str,
        now: OffsetDateTime,
    ) -> Result<SessionState, AuthenticationError> {
        let Some(token) = token else {
            return Ok(SessionState::Anonymous);
        };

        let result = self.resolve(token, observed_host, now).await;
        if let Err(err) = &result {
            warn!(
                target = "quire::auth",
                reason = err.reason(),
                observed_host,
                error = %err,
                "session rejected"
            );
            counter!(METRIC_REJECTED, "reason" => err.reason()).increment(1);
        }
        result.map(|user| SessionState::Authenticated(Arc::new(user)))
    }

    async fn resolve(
        &self,
        token: &str,
        observed_host: &str,
        now: OffsetDateTime,
    ) -> Result<UserRecord, AuthenticationError> {
        let claims = self.signer.verify(token)?;

        if claims.bound_host != observed_host {
            return Err(AuthenticationError::HostMismatch);
        }
        if claims.issued_at + self.max_session <= now {
            return Err(AuthenticationError::Expired);
        }

        self.users
            .find_by_id(claims.user_id)
            .await
            .map_err(AuthenticationError::Directory)?
            .ok_or(AuthenticationError::UnknownUser)
    }
}
