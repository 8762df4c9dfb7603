//! In-process document store backing the repository traits.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    FailedLoginRepo, ListWindow, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::posts::{AuthoredComment, CommentRecord, PostRecord};
use crate::domain::users::{AccountChanges, FailedLoginRecord, UserRecord};

#[derive(Debug, Clone, Default)]
pub struct MemoryRepositories {
    users: Arc<DashMap<Uuid, UserRecord>>,
    usernames: Arc<DashMap<String, Uuid>>,
    emails: Arc<DashMap<String, Uuid>>,
    posts: Arc<DashMap<Uuid, PostRecord>>,
    failed_logins: Arc<DashMap<(String, String), Vec<OffsetDateTime>>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_post<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut PostRecord) -> T,
    ) -> Result<T, RepoError> {
        let mut post = self.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        Ok(apply(&mut post))
    }

    fn newest_first(mut posts: Vec<PostRecord>) -> Vec<PostRecord> {
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        posts
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let Some(id) = self.usernames.get(username).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn insert(&self, user: UserRecord) -> Result<(), RepoError> {
        let Entry::Vacant(name_slot) = self.usernames.entry(user.username.clone()) else {
            return Err(RepoError::duplicate("users_username_key"));
        };
        let Entry::Vacant(email_slot) = self.emails.entry(user.email.clone()) else {
            return Err(RepoError::duplicate("users_email_key"));
        };
        name_slot.insert(user.id);
        email_slot.insert(user.id);
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<UserRecord, RepoError> {
        // Never hold a user guard while taking an index entry; `insert` locks
        // in the opposite order.
        let current = self
            .users
            .get(&id)
            .map(|user| user.email.clone())
            .ok_or(RepoError::NotFound)?;
        if let Some(email) = changes.email.as_ref().filter(|email| **email != current) {
            match self.emails.entry(email.clone()) {
                Entry::Occupied(_) => return Err(RepoError::duplicate("users_email_key")),
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.emails.remove(&current);
        }

        let mut user = self.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.apply(changes);
        Ok(user.clone())
    }

    async fn touch_activity(&self, id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut user = self.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.last_activity = Some(at);
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn list(&self, window: ListWindow) -> Result<Vec<PostRecord>, RepoError> {
        let posts = Self::newest_first(
            self.posts
                .iter()
                .filter(|p| !p.private)
                .map(|entry| entry.value().clone())
                .collect(),
        );
        Ok(posts
            .into_iter()
            .skip(window.start.unwrap_or(0))
            .take(window.count.unwrap_or(usize::MAX))
            .collect())
    }

    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        Ok(Self::newest_first(
            self.posts
                .iter()
                .filter(|p| p.author_id == author_id)
                .map(|entry| entry.value().clone())
                .collect(),
        ))
    }

    async fn liked_by(&self, user_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        Ok(Self::newest_first(
            self.posts
                .iter()
                .filter(|p| p.likes.contains(&user_id))
                .map(|entry| entry.value().clone())
                .collect(),
        ))
    }

    async fn comments_by(&self, author_id: Uuid) -> Result<Vec<AuthoredComment>, RepoError> {
        let mut comments: Vec<AuthoredComment> = self
            .posts
            .iter()
            .flat_map(|post| {
                post.comments
                    .iter()
                    .filter(|comment| comment.author_id == author_id)
                    .map(|comment| AuthoredComment {
                        post_id: post.id,
                        comment: comment.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        comments.sort_by(|a, b| {
            b.comment
                .created_at
                .cmp(&a.comment.created_at)
                .then_with(|| a.comment.id.cmp(&b.comment.id))
        });
        Ok(comments)
    }

    async fn search(&self, needle: &str) -> Result<Vec<PostRecord>, RepoError> {
        Ok(Self::newest_first(
            self.posts
                .iter()
                .filter(|p| p.matches(needle))
                .map(|entry| entry.value().clone())
                .collect(),
        ))
    }

    async fn find(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.get(&id).map(|post| post.clone()))
    }

    async fn insert(&self, post: PostRecord) -> Result<(), RepoError> {
        match self.posts.entry(post.id) {
            Entry::Occupied(_) => Err(RepoError::duplicate("posts_pkey")),
            Entry::Vacant(slot) => {
                slot.insert(post);
                Ok(())
            }
        }
    }

    async fn replace(&self, post: PostRecord) -> Result<(), RepoError> {
        self.update_post(post.id, |stored| *stored = post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.posts
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn add_comment(&self, post_id: Uuid, comment: CommentRecord) -> Result<(), RepoError> {
        self.update_post(post_id, |post| post.comments.push(comment))
    }

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        self.update_post(post_id, |post| {
            post.likes.insert(user_id);
        })
    }

    async fn add_view(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        address: &str,
    ) -> Result<(), RepoError> {
        self.update_post(post_id, |post| {
            post.views.insert((user_id, address.to_string()));
        })
    }
}

#[async_trait]
impl FailedLoginRepo for MemoryRepositories {
    async fn record(&self, attempt: FailedLoginRecord) -> Result<(), RepoError> {
        self.failed_logins
            .entry((attempt.username, attempt.remote_address))
            .or_default()
            .push(attempt.attempted_at);
        Ok(())
    }

    async fn attempts_since(
        &self,
        username: &str,
        remote_address: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<OffsetDateTime>, RepoError> {
        let key = (username.to_string(), remote_address.to_string());
        // Records older than the requested window are dropped for good.
        let mut attempts = match self.failed_logins.get_mut(&key) {
            Some(mut bucket) => {
                bucket.retain(|at| *at >= since);
                bucket.clone()
            }
            None => return Ok(Vec::new()),
        };
        if attempts.is_empty() {
            self.failed_logins
                .remove_if(&key, |_, bucket| bucket.is_empty());
        }
        attempts.sort();
        Ok(attempts)
    }
}
