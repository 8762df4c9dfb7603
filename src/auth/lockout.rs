//! Sliding-window brute-force lockout keyed by `(username, address)`.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::repos::{FailedLoginRepo, RepoError};
use crate::config::LoginSettings;
use crate::domain::users::FailedLoginRecord;

const METRIC_LOCKOUT: &str = "quire_login_lockout_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed: NonZeroU32,
    pub window: Duration,
}

impl From<&LoginSettings> for LockoutPolicy {
    fn from(settings: &LoginSettings) -> Self {
        Self {
            max_failed: settings.max_failed_login,
            window: settings.failed_login_timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum LockoutError {
    #[error("too many failed attempts; retry in {}s", .retry_after.as_secs())]
    LockedOut { retry_after: Duration },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Thresholds are read once per check; a replaced policy applies from the
/// next login attempt on.
pub struct FailedLoginTracker {
    repo: Arc<dyn FailedLoginRepo>,
    policy: ArcSwap<LockoutPolicy>,
}

impl FailedLoginTracker {
    pub fn new(repo: Arc<dyn FailedLoginRepo>, policy: LockoutPolicy) -> Self {
        Self {
            repo,
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn policy(&self) -> LockoutPolicy {
        **self.policy.load()
    }

    /// Swap in new thresholds without blocking concurrent checks.
    pub fn replace_policy(&self, policy: LockoutPolicy) {
        let previous = self.policy.swap(Arc::new(policy));
        info!(
            target = "quire::auth::lockout",
            max_failed = policy.max_failed.get(),
            window_secs = policy.window.as_secs(),
            previous_max_failed = previous.max_failed.get(),
            previous_window_secs = previous.window.as_secs(),
            "lockout policy replaced"
        );
    }

    /// Reject when the trailing window already holds `max_failed` records.
    pub async fn check(
        &self,
        username: &str,
        remote_address: &str,
        now: OffsetDateTime,
    ) -> Result<(), LockoutError> {
        let policy = self.policy();
        let since = now - policy.window;
        let attempts = self
            .repo
            .attempts_since(username, remote_address, since)
            .await?;

        if attempts.len() < policy.max_failed.get() as usize {
            return Ok(());
        }

        let retry_after = attempts
            .iter()
            .min()
            .map(|oldest| *oldest + policy.window - now)
            .and_then(|remaining| Duration::try_from(remaining).ok())
            .unwrap_or_default()
            .max(Duration::from_secs(1));

        warn!(
            target = "quire::auth::lockout",
            username,
            remote_address,
            attempts = attempts.len(),
            retry_after_secs = retry_after.as_secs(),
            "login rejected by lockout"
        );
        counter!(METRIC_LOCKOUT).increment(1);
        Err(LockoutError::LockedOut { retry_after })
    }

    pub async fn record_failure(
        &self,
        username: &str,
        remote_address: &str,
        now: OffsetDateTime,
    ) -> Result<(), RepoError> {
        self.repo
            .record(FailedLoginRecord {
                username: username.to_string(),
                remote_address: remote_address.to_string(),
                attempted_at: now,
            })
            .await
    }
}
