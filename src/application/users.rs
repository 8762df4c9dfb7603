//! Login, registration and profile services.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::{AppError, blocking};
use crate::application::repos::{PostsRepo, RepoError, UsersRepo};
use crate::auth::{FailedLoginTracker, LockoutError, PasswordHasher, SessionAuthenticator};
use crate::domain::error::DomainError;
use crate::domain::posts::{AuthoredComment, PostRecord};
use crate::domain::users::{AccountChanges, NewUser, ProfileUpdate, UserRecord, UserRole};

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("user not found")]
    UnknownUser,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many failed attempts")]
    LockedOut { retry_after: Duration },
    #[error(transparent)]
    App(#[from] AppError),
}

impl From<RepoError> for LoginError {
    fn from(err: RepoError) -> Self {
        Self::App(AppError::Repo(err))
    }
}

impl From<LockoutError> for LoginError {
    fn from(err: LockoutError) -> Self {
        match err {
            LockoutError::LockedOut { retry_after } => Self::LockedOut { retry_after },
            LockoutError::Repo(err) => err.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserRecord,
    pub token: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileCommand {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user: UserRecord,
    pub posts: Vec<PostRecord>,
    pub comments: Vec<AuthoredComment>,
    pub liked_posts: Vec<PostRecord>,
}

pub struct UserService {
    users: Arc<dyn UsersRepo>,
    posts: Arc<dyn PostsRepo>,
    lockout: Arc<FailedLoginTracker>,
    sessions: Arc<SessionAuthenticator>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        posts: Arc<dyn PostsRepo>,
        lockout: Arc<FailedLoginTracker>,
        sessions: Arc<SessionAuthenticator>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            users,
            posts,
            lockout,
            sessions,
            hasher,
        }
    }

    pub async fn login(
        &self,
        cmd: LoginCommand,
        address: &str,
        now: OffsetDateTime,
    ) -> Result<IssuedSession, LoginError> {
        let user = self
            .users
            .find_by_username(cmd.username.trim())
            .await?
            .ok_or(LoginError::UnknownUser)?;

        // Checked before the password so a locked pair learns nothing.
        self.lockout.check(&user.username, address, now).await?;

        let hasher = self.hasher.clone();
        let stored = user.password_hash.clone();
        let password = cmd.password;
        let matches =
            blocking(move || hasher.verify(&password, &stored).map_err(AppError::from)).await?;

        if !matches {
            self.lockout
                .record_failure(&user.username, address, now)
                .await?;
            warn!(
                target = "quire::auth",
                username = %user.username,
                address,
                "password rejected"
            );
            return Err(LoginError::InvalidCredentials);
        }

        if let Err(err) = self.users.touch_activity(user.id, now).await {
            warn!(target = "quire::auth", user_id = %user.id, error = %err, "failed to record activity");
        }
        let token = self
            .sessions
            .issue_for(&user, address, now)
            .map_err(AppError::from)?;
        info!(target = "quire::auth", user_id = %user.id, address, "session issued");
        Ok(IssuedSession { user, token })
    }

    pub async fn register(
        &self,
        cmd: RegisterCommand,
        address: &str,
        now: OffsetDateTime,
    ) -> Result<IssuedSession, AppError> {
        let new_user = NewUser::parse(
            &cmd.username,
            &cmd.email,
            cmd.full_name.as_deref(),
            &cmd.password,
        )?;

        if self
            .users
            .find_by_username(&new_user.username)
            .await?
            .is_some()
        {
            return Err(DomainError::conflict("user").into());
        }

        let hasher = self.hasher.clone();
        let password = new_user.password;
        let password_hash = blocking(move || hasher.hash(&password).map_err(AppError::from)).await?;

        let user = UserRecord {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            password_hash,
            role: UserRole::Blogger,
            created_at: now,
            last_activity: Some(now),
        };
        self.users.insert(user.clone()).await.map_err(|err| match err {
            RepoError::Duplicate { .. } => AppError::from(DomainError::conflict("user")),
            other => other.into(),
        })?;

        let token = self.sessions.issue_for(&user, address, now)?;
        info!(target = "quire::auth", user_id = %user.id, username = %user.username, "user registered");
        Ok(IssuedSession { user, token })
    }

    pub async fn profile(&self, user: &UserRecord) -> Result<UserProfile, AppError> {
        let (posts, comments, liked_posts) = futures::try_join!(
            self.posts.list_by_author(user.id),
            self.posts.comments_by(user.id),
            self.posts.liked_by(user.id),
        )?;
        // Someone else's private post stays hidden even if this user liked it.
        let liked_posts = liked_posts
            .into_iter()
            .filter(|post| !post.private || post.author_id == user.id)
            .collect();
        Ok(UserProfile {
            user: user.clone(),
            posts,
            comments,
            liked_posts,
        })
    }

    /// Change the full name, email or password. Absent fields are kept.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        cmd: ProfileCommand,
    ) -> Result<UserRecord, AppError> {
        let update = ProfileUpdate::parse(
            cmd.full_name.as_deref(),
            cmd.email.as_deref(),
            cmd.password.as_deref(),
        )?;

        let password_hash = match update.password {
            Some(password) => {
                let hasher = self.hasher.clone();
                Some(blocking(move || hasher.hash(&password).map_err(AppError::from)).await?)
            }
            None => None,
        };
        let password_changed = password_hash.is_some();

        let user = self
            .users
            .update_account(
                user_id,
                AccountChanges {
                    full_name: update.full_name,
                    email: update.email,
                    password_hash,
                },
            )
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DomainError::not_found("user").into(),
                RepoError::Duplicate { .. } => DomainError::conflict("email").into(),
                other => AppError::from(other),
            })?;
        info!(
            target = "quire::auth",
            user_id = %user.id,
            password_changed,
            "profile updated"
        );
        Ok(user)
    }
}
