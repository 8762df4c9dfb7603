use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::application::posts::PostCommand;
use crate::application::settings::{LoginSettingsCommand, LoginSettingsView};
use crate::application::users::{ProfileCommand, UserProfile};
use crate::domain::posts::{AuthoredComment, CommentRecord, PostRecord};
use crate::domain::users::{UserRecord, UserRole};

fn iso(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

pub fn post_href(id: Uuid) -> String {
    format!("/v1/post/{id}/")
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PostForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub private: bool,
}

impl From<PostForm> for PostCommand {
    fn from(form: PostForm) -> Self {
        Self {
            title: form.title,
            description: form.description,
            content: form.content,
            tags: form.tags,
            featured: form.featured,
            private: form.private,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentForm {
    pub content: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl From<ProfileForm> for ProfileCommand {
    fn from(form: ProfileForm) -> Self {
        Self {
            full_name: form.full_name,
            email: form.email,
            password: form.password,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginSettingsForm {
    pub max_failed_login: u32,
    pub failed_login_timeout_seconds: u64,
}

impl From<LoginSettingsForm> for LoginSettingsCommand {
    fn from(form: LoginSettingsForm) -> Self {
        Self {
            max_failed_login: form.max_failed_login,
            failed_login_timeout_seconds: form.failed_login_timeout_seconds,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenDto {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LinkDto {
    pub rel: &'static str,
    pub href: String,
}

#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: Uuid,
    pub author: Uuid,
    pub content: String,
    pub created: String,
}

impl From<&CommentRecord> for CommentDto {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            id: comment.id,
            author: comment.author_id,
            content: comment.content.clone(),
            created: iso(comment.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDto {
    pub href: String,
    pub id: Uuid,
    pub author: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub private: bool,
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited: Option<String>,
    pub likes: usize,
    pub views: usize,
    pub comments: Vec<CommentDto>,
    pub links: Vec<LinkDto>,
}

impl From<&PostRecord> for PostDto {
    fn from(post: &PostRecord) -> Self {
        let href = post_href(post.id);
        let links = vec![
            LinkDto {
                rel: "post-comment",
                href: format!("/v1/post/{}/comment", post.id),
            },
            LinkDto {
                rel: "post-like",
                href: format!("/v1/post/{}/like", post.id),
            },
            LinkDto {
                rel: "post-view",
                href: format!("/v1/post/{}/view", post.id),
            },
        ];
        Self {
            href,
            id: post.id,
            author: post.author_id,
            title: post.title.clone(),
            description: post.description.clone(),
            content: post.content.clone(),
            tags: post.tags.clone(),
            featured: post.featured,
            private: post.private,
            created: iso(post.created_at),
            edited: post.edited_at.map(iso),
            likes: post.likes.len(),
            views: post.views.len(),
            comments: post.comments.iter().map(CommentDto::from).collect(),
            links,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostCollectionDto {
    pub posts: Vec<PostDto>,
}

impl PostCollectionDto {
    pub fn from_records(posts: &[PostRecord]) -> Self {
        Self {
            posts: posts.iter().map(PostDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

impl From<&UserRecord> for UserDto {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            created: iso(user.created_at),
            last_activity: user.last_activity.map(iso),
        }
    }
}

/// A comment as listed on its author's profile, linked to its post.
#[derive(Debug, Serialize)]
pub struct ProfileCommentDto {
    pub post: String,
    #[serde(flatten)]
    pub comment: CommentDto,
}

impl From<&AuthoredComment> for ProfileCommentDto {
    fn from(authored: &AuthoredComment) -> Self {
        Self {
            post: post_href(authored.post_id),
            comment: CommentDto::from(&authored.comment),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileDto {
    pub user: UserDto,
    pub posts: Vec<PostDto>,
    pub comments: Vec<ProfileCommentDto>,
    pub liked_posts: Vec<PostDto>,
}

impl From<&UserProfile> for ProfileDto {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user: UserDto::from(&profile.user),
            posts: profile.posts.iter().map(PostDto::from).collect(),
            comments: profile.comments.iter().map(ProfileCommentDto::from).collect(),
            liked_posts: profile.liked_posts.iter().map(PostDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginSettingsDto {
    pub max_failed_login: u32,
    pub failed_login_timeout_seconds: u64,
    pub max_session_seconds: u64,
}

impl From<LoginSettingsView> for LoginSettingsDto {
    fn from(view: LoginSettingsView) -> Self {
        Self {
            max_failed_login: view.policy.max_failed.get(),
            failed_login_timeout_seconds: view.policy.window.as_secs(),
            max_session_seconds: view.max_session.as_secs(),
        }
    }
}
