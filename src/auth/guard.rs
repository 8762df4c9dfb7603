//! Per-route access rules evaluated against the request's [`SessionState`].

use thiserror::Error;

use crate::domain::users::UserRole;

use super::authenticator::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    Authenticated,
    Anonymous,
    /// Moderator or admin.
    Moderator,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("authentication required")]
    Unauthenticated,
    #[error("resource not available while signed in")]
    AlreadyAuthenticated,
    #[error("role `{}` is not permitted", .0.as_str())]
    InsufficientRole(UserRole),
}

impl AccessRule {
    pub fn check(self, session: &SessionState) -> Result<(), AccessDenied> {
        match (self, session.user()) {
            (AccessRule::Anonymous, None) => Ok(()),
            (AccessRule::Anonymous, Some(_)) => Err(AccessDenied::AlreadyAuthenticated),
            (_, None) => Err(AccessDenied::Unauthenticated),
            (AccessRule::Authenticated, Some(_)) => Ok(()),
            (AccessRule::Moderator, Some(user)) if user.role.can_moderate() => Ok(()),
            (AccessRule::Admin, Some(user)) if user.role == UserRole::Admin => Ok(()),
            (_, Some(user)) => Err(AccessDenied::InsufficientRole(user.role)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::domain::users::UserRecord;

    fn session(role: UserRole) -> SessionState {
        SessionState::Authenticated(Arc::new(UserRecord {
            id: Uuid::new_v4(),
            username: "carol".into(),
            email: "carol@example.com".into(),
            full_name: None,
            password_hash: String::new(),
            role,
            created_at: OffsetDateTime::UNIX_EPOCH,
            last_activity: None,
        }))
    }

    #[test]
    fn anonymous_requests() {
        let anon = SessionState::Anonymous;
        assert_eq!(AccessRule::Anonymous.check(&anon), Ok(()));
        for rule in [AccessRule::Authenticated, AccessRule::Moderator, AccessRule::Admin] {
            assert_eq!(rule.check(&anon), Err(AccessDenied::Unauthenticated));
        }
    }

    #[test]
    fn signed_in_user_cannot_use_anonymous_routes() {
        assert_eq!(
            AccessRule::Anonymous.check(&session(UserRole::Admin)),
            Err(AccessDenied::AlreadyAuthenticated)
        );
    }

    #[test]
    fn roles_are_ranked() {
        let blogger = session(UserRole::Blogger);
        let moderator = session(UserRole::Moderator);
        let admin = session(UserRole::Admin);

        assert_eq!(AccessRule::Authenticated.check(&blogger), Ok(()));
        assert_eq!(
            AccessRule::Moderator.check(&blogger),
            Err(AccessDenied::InsufficientRole(UserRole::Blogger))
        );
        assert_eq!(AccessRule::Moderator.check(&moderator), Ok(()));
        assert_eq!(AccessRule::Moderator.check(&admin), Ok(()));
        assert_eq!(
            AccessRule::Admin.check(&moderator),
            Err(AccessDenied::InsufficientRole(UserRole::Moderator))
        );
        assert_eq!(AccessRule::Admin.check(&admin), Ok(()));
    }
}
