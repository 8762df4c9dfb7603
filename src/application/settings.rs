//! Runtime view and replacement of the login thresholds.
//!
//! Settings load once at startup; the lockout thresholds are the one part an
//! admin may replace afterwards. Session lifetime and the signing secret stay
//! fixed for the life of the process.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::application::error::AppError;
use crate::auth::{FailedLoginTracker, LockoutPolicy, SessionAuthenticator};
use crate::domain::error::DomainError;
use crate::domain::users::UserRecord;

/// Longest lockout window an admin may set.
const MAX_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginSettingsView {
    pub policy: LockoutPolicy,
    pub max_session: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct LoginSettingsCommand {
    pub max_failed_login: u32,
    pub failed_login_timeout_seconds: u64,
}

impl LoginSettingsCommand {
    fn into_policy(self) -> Result<LockoutPolicy, DomainError> {
        let max_failed = NonZeroU32::new(self.max_failed_login)
            .ok_or_else(|| DomainError::validation("max_failed_login", "must be at least 1"))?;
        if !(1..=MAX_WINDOW_SECS).contains(&self.failed_login_timeout_seconds) {
            return Err(DomainError::validation(
                "failed_login_timeout_seconds",
                format!("must be 1 to {MAX_WINDOW_SECS} seconds"),
            ));
        }
        Ok(LockoutPolicy {
            max_failed,
            window: Duration::from_secs(self.failed_login_timeout_seconds),
        })
    }
}

pub struct SettingsService {
    lockout: Arc<FailedLoginTracker>,
    sessions: Arc<SessionAuthenticator>,
}

impl SettingsService {
    pub fn new(lockout: Arc<FailedLoginTracker>, sessions: Arc<SessionAuthenticator>) -> Self {
        Self { lockout, sessions }
    }

    pub fn load(&self) -> LoginSettingsView {
        LoginSettingsView {
            policy: self.lockout.policy(),
            max_session: self.sessions.max_session(),
        }
    }

    pub fn update(
        &self,
        actor: &UserRecord,
        command: LoginSettingsCommand,
    ) -> Result<LoginSettingsView, AppError> {
        let policy = command.into_policy()?;
        self.lockout.replace_policy(policy);
        info!(
            target = "quire::settings",
            actor_id = %actor.id,
            max_failed_login = policy.max_failed.get(),
            failed_login_timeout_secs = policy.window.as_secs(),
            "login settings updated"
        );
        Ok(self.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(max_failed_login: u32, failed_login_timeout_seconds: u64) -> LoginSettingsCommand {
        LoginSettingsCommand {
            max_failed_login,
            failed_login_timeout_seconds,
        }
    }

    #[test]
    fn thresholds_must_be_positive_and_bounded() {
        assert!(matches!(
            command(0, 300).into_policy(),
            Err(DomainError::Validation { field: "max_failed_login", .. })
        ));
        assert!(matches!(
            command(5, 0).into_policy(),
            Err(DomainError::Validation { field: "failed_login_timeout_seconds", .. })
        ));
        assert!(command(5, MAX_WINDOW_SECS + 1).into_policy().is_err());

        let policy = command(3, 60).into_policy().expect("valid");
        assert_eq!(policy.max_failed.get(), 3);
        assert_eq!(policy.window, Duration::from_secs(60));
    }
}
