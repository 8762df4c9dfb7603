//! Post, comment, like and view services.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{ListWindow, PostsRepo, RepoError};
use crate::domain::error::DomainError;
use crate::domain::posts::{CommentRecord, PostDraft, PostRecord, parse_comment};
use crate::domain::users::UserRecord;

#[derive(Debug, Clone)]
pub struct PostCommand {
    pub title: String,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub private: bool,
}

impl PostCommand {
    fn into_draft(self) -> Result<PostDraft, DomainError> {
        PostDraft::parse(
            &self.title,
            &self.description,
            &self.content,
            &self.tags,
            self.featured,
            self.private,
        )
    }
}

pub struct PostService {
    posts: Arc<dyn PostsRepo>,
}

fn not_found(err: RepoError) -> AppError {
    match err {
        RepoError::NotFound => DomainError::not_found("post").into(),
        other => other.into(),
    }
}

/// Authors may change their own posts; moderators and admins any post.
fn ensure_post_access(user: &UserRecord, post: &PostRecord) -> Result<(), AppError> {
    if post.author_id == user.id || user.role.can_moderate() {
        Ok(())
    } else {
        Err(AppError::Forbidden("only the author or a moderator may change this post"))
    }
}

impl PostService {
    pub fn new(posts: Arc<dyn PostsRepo>) -> Self {
        Self { posts }
    }

    /// Public posts, newest first.
    pub async fn list(&self, window: ListWindow) -> Result<Vec<PostRecord>, AppError> {
        Ok(self.posts.list(window).await?)
    }

    /// Public posts plus the requester's own private ones.
    pub async fn search(&self, viewer: &UserRecord, needle: &str) -> Result<Vec<PostRecord>, AppError> {
        let posts = self.posts.search(needle).await?;
        Ok(posts
            .into_iter()
            .filter(|post| !post.private || post.author_id == viewer.id)
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<PostRecord, AppError> {
        self.posts
            .find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("post").into())
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        cmd: PostCommand,
        now: OffsetDateTime,
    ) -> Result<PostRecord, AppError> {
        let draft = cmd.into_draft()?;
        if draft.featured && !author.role.can_moderate() {
            return Err(AppError::Forbidden("only moderators may feature posts"));
        }

        let post = PostRecord::new(Uuid::new_v4(), author.id, draft, now);
        self.posts.insert(post.clone()).await?;
        info!(target = "quire::posts", post_id = %post.id, author_id = %author.id, "post created");
        Ok(post)
    }

    pub async fn update(
        &self,
        user: &UserRecord,
        id: Uuid,
        cmd: PostCommand,
        now: OffsetDateTime,
    ) -> Result<(), AppError> {
        let mut post = self.get(id).await?;
        ensure_post_access(user, &post)?;

        let draft = cmd.into_draft()?;
        if draft.featured && !post.featured && !user.role.can_moderate() {
            return Err(AppError::Forbidden("only moderators may feature posts"));
        }

        post.apply(draft, now);
        self.posts.replace(post).await.map_err(not_found)
    }

    pub async fn delete(&self, user: &UserRecord, id: Uuid) -> Result<(), AppError> {
        let post = self.get(id).await?;
        ensure_post_access(user, &post)?;
        self.posts.delete(id).await.map_err(not_found)?;
        info!(target = "quire::posts", post_id = %id, user_id = %user.id, "post deleted");
        Ok(())
    }

    pub async fn comment(
        &self,
        user: &UserRecord,
        id: Uuid,
        content: &str,
        now: OffsetDateTime,
    ) -> Result<CommentRecord, AppError> {
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            author_id: user.id,
            content: parse_comment(content)?,
            created_at: now,
        };
        self.posts
            .add_comment(id, comment.clone())
            .await
            .map_err(not_found)?;
        Ok(comment)
    }

    pub async fn like(&self, user: &UserRecord, id: Uuid) -> Result<(), AppError> {
        self.posts.add_like(id, user.id).await.map_err(not_found)
    }

    pub async fn view(&self, user: &UserRecord, id: Uuid, address: &str) -> Result<(), AppError> {
        self.posts
            .add_view(id, user.id, address)
            .await
            .map_err(not_found)
    }
}
