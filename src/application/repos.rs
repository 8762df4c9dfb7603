//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::posts::{AuthoredComment, CommentRecord, PostRecord};
use crate::domain::users::{AccountChanges, FailedLoginRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }
}

/// Offset window over a listing. Values are handed to the store as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListWindow {
    pub start: Option<usize>,
    pub count: Option<usize>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Fails with [`RepoError::Duplicate`] when the username or email is taken.
    async fn insert(&self, user: UserRecord) -> Result<(), RepoError>;

    /// Apply `changes` to a stored user. Fails with [`RepoError::Duplicate`]
    /// when the new email belongs to someone else.
    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<UserRecord, RepoError>;

    async fn touch_activity(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Public posts, newest first. Private posts are excluded before the
    /// window is applied.
    async fn list(&self, window: ListWindow) -> Result<Vec<PostRecord>, RepoError>;

    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<PostRecord>, RepoError>;

    /// Posts carrying a like from `user_id`, newest first.
    async fn liked_by(&self, user_id: Uuid) -> Result<Vec<PostRecord>, RepoError>;

    /// Comments written by `author_id` on any post, newest first.
    async fn comments_by(&self, author_id: Uuid) -> Result<Vec<AuthoredComment>, RepoError>;

    async fn search(&self, needle: &str) -> Result<Vec<PostRecord>, RepoError>;

    async fn find(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn insert(&self, post: PostRecord) -> Result<(), RepoError>;

    /// Replace a stored post. Fails with [`RepoError::NotFound`] when absent.
    async fn replace(&self, post: PostRecord) -> Result<(), RepoError>;

    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;

    async fn add_comment(&self, post_id: Uuid, comment: CommentRecord) -> Result<(), RepoError>;

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError>;

    async fn add_view(&self, post_id: Uuid, user_id: Uuid, address: &str)
    -> Result<(), RepoError>;
}

#[async_trait]
pub trait FailedLoginRepo: Send + Sync {
    async fn record(&self, attempt: FailedLoginRecord) -> Result<(), RepoError>;

    /// Timestamps of failures for the pair at or after `since`, oldest first.
    ///
    /// Stores may discard records older than `since` for the pair.
    async fn attempts_since(
        &self,
        username: &str,
        remote_address: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<OffsetDateTime>, RepoError>;
}
