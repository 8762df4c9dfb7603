//! Blog posts with their embedded comments, likes and views.

use std::collections::BTreeSet;

use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

const TITLE_MAX: usize = 160;
const DESCRIPTION_MAX: usize = 512;
const TAG_MAX: usize = 32;
const TAGS_PER_POST: usize = 16;
const COMMENT_MAX: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

/// A comment together with the post it was left on.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoredComment {
    pub post_id: Uuid,
    pub comment: CommentRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub private: bool,
    pub created_at: OffsetDateTime,
    pub edited_at: Option<OffsetDateTime>,
    pub likes: BTreeSet<Uuid>,
    /// One entry per distinct `(viewer, address)` pair.
    pub views: BTreeSet<(Uuid, String)>,
    pub comments: Vec<CommentRecord>,
}

impl PostRecord {
    pub fn new(id: Uuid, author_id: Uuid, draft: PostDraft, now: OffsetDateTime) -> Self {
        Self {
            id,
            author_id,
            title: draft.title,
            description: draft.description,
            content: draft.content,
            tags: draft.tags,
            featured: draft.featured,
            private: draft.private,
            created_at: now,
            edited_at: None,
            likes: BTreeSet::new(),
            views: BTreeSet::new(),
            comments: Vec::new(),
        }
    }

    pub fn apply(&mut self, draft: PostDraft, now: OffsetDateTime) {
        self.title = draft.title;
        self.description = draft.description;
        self.content = draft.content;
        self.tags = draft.tags;
        self.featured = draft.featured;
        self.private = draft.private;
        self.edited_at = Some(now);
    }

    /// Case-insensitive match on the title, description or any tag.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.tags.iter().any(|tag| tag.contains(&needle))
    }
}

/// Validated create/update input for a post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub private: bool,
}

impl PostDraft {
    pub fn parse(
        title: &str,
        description: &str,
        content: &str,
        tags: &[String],
        featured: bool,
        private: bool,
    ) -> Result<Self, DomainError> {
        let title = title.trim();
        if title.is_empty() || title.chars().count() > TITLE_MAX {
            return Err(DomainError::validation(
                "title",
                format!("must be 1 to {TITLE_MAX} characters"),
            ));
        }
        let description = description.trim();
        if description.chars().count() > DESCRIPTION_MAX {
            return Err(DomainError::validation(
                "description",
                format!("must be at most {DESCRIPTION_MAX} characters"),
            ));
        }
        if content.trim().is_empty() {
            return Err(DomainError::validation("content", "must not be empty"));
        }

        Ok(Self {
            title: title.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            tags: normalize_tags(tags)?,
            featured,
            private,
        })
    }
}

/// Lowercase, trim and deduplicate tags, keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>, DomainError> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > TAG_MAX {
            return Err(DomainError::validation(
                "tags",
                format!("each tag must be at most {TAG_MAX} characters"),
            ));
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.len() > TAGS_PER_POST {
        return Err(DomainError::validation(
            "tags",
            format!("at most {TAGS_PER_POST} tags per post"),
        ));
    }
    Ok(tags)
}

pub fn parse_comment(raw: &str) -> Result<String, DomainError> {
    let content = raw.trim();
    if content.is_empty() || content.chars().count() > COMMENT_MAX {
        return Err(DomainError::validation(
            "content",
            format!("must be 1 to {COMMENT_MAX} characters"),
        ));
    }
    Ok(content.to_string())
}
