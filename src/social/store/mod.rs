// Content store seam - every read and write the social core performs
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{
    Bookmark, Draft, NewUser, Notification, Post, ProfilePatch, Reaction, User,
};
use crate::social::domain::{DraftId, NotificationId, PostId, ReactionType, UserId};

pub use sqlite::SqliteContentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Conflict(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCounter {
    Likes,
    Replies,
    Reposts,
}

impl PostCounter {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Likes => "likes_count",
            Self::Replies => "replies_count",
            Self::Reposts => "reposts_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCounter {
    Followers,
    Following,
}

impl UserCounter {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Followers => "followers_count",
            Self::Following => "following_count",
        }
    }
}

/// Keyset position in a newest-first listing. Rows come strictly after
/// (`at`, `post`): older, or equally old with a smaller post id. Without
/// a post id the position is the timestamp alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub at: DateTime<Utc>,
    pub post: Option<PostId>,
}

impl Cursor {
    pub fn new(at: DateTime<Utc>, post: PostId) -> Self {
        Self {
            at,
            post: Some(post),
        }
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self { at, post: None }
    }

    /// Reads `<rfc3339>` or `<rfc3339>_<post id>`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (time, post) = match raw.split_once('_') {
            Some((time, post)) => (time, Some(PostId::parse(post).ok()?)),
            None => (raw, None),
        };
        let at = crate::db::parse_timestamp(time).ok()?;
        Some(Self { at, post })
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let at = crate::db::format_timestamp(self.at);
        match &self.post {
            Some(post) => write!(f, "{}_{}", at, post.as_str()),
            None => f.write_str(&at),
        }
    }
}

/// Structured post filter. Every set field narrows the result; results are
/// always newest first.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub authors: Option<Vec<UserId>>,
    pub top_level_only: bool,
    pub parent: Option<PostId>,
    pub reposts_of: Option<Vec<PostId>>,
    pub text_contains: Option<String>,
    pub before: Option<Cursor>,
    pub limit: Option<usize>,
}

impl PostQuery {
    pub fn top_level() -> Self {
        Self {
            top_level_only: true,
            ..Self::default()
        }
    }

    pub fn by_authors(mut self, authors: Vec<UserId>) -> Self {
        self.authors = Some(authors);
        self
    }

    pub fn replies_to(parent: PostId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Reposts by `author` whose origin is one of `origins`.
    pub fn reposts_by(author: UserId, origins: Vec<PostId>) -> Self {
        Self {
            authors: Some(vec![author]),
            reposts_of: Some(origins),
            ..Self::default()
        }
    }

    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.text_contains = Some(needle.into());
        self
    }

    pub fn before(mut self, cursor: Option<Cursor>) -> Self {
        self.before = cursor;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Outcome of a reaction write that only lands when the row state differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionWrite {
    Inserted,
    Updated,
    Unchanged,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    // -- users --
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_identity(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError>;
    async fn find_users_by_handles(&self, handles: &[String]) -> Result<Vec<User>, StoreError>;
    /// Case-insensitive substring match over handle, name and display name.
    async fn search_users(&self, needle: &str, limit: usize) -> Result<Vec<User>, StoreError>;
    async fn update_profile(&self, id: &UserId, patch: &ProfilePatch) -> Result<(), StoreError>;
    async fn increment_user_counter(
        &self,
        id: &UserId,
        counter: UserCounter,
        delta: i64,
    ) -> Result<(), StoreError>;

    // -- posts --
    /// Fails with `StoreError::Conflict` when the author already reposted
    /// the same origin.
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError>;
    async fn find_post(&self, id: &PostId) -> Result<Option<Post>, StoreError>;
    async fn find_posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>, StoreError>;
    async fn find_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError>;
    async fn count_posts(&self, query: &PostQuery) -> Result<u64, StoreError>;
    async fn delete_post(&self, id: &PostId) -> Result<bool, StoreError>;
    /// Atomic `counter += delta`, floored at zero.
    async fn increment_post_counter(
        &self,
        id: &PostId,
        counter: PostCounter,
        delta: i64,
    ) -> Result<(), StoreError>;

    // -- reactions --
    /// Insert, retype or leave alone the single (user, post) reaction row.
    /// Insertion relies on the unique (user, post) index.
    async fn write_reaction(
        &self,
        user: &UserId,
        post: &PostId,
        kind: ReactionType,
    ) -> Result<ReactionWrite, StoreError>;
    async fn insert_reaction_if_absent(
        &self,
        user: &UserId,
        post: &PostId,
        kind: ReactionType,
    ) -> Result<bool, StoreError>;
    async fn delete_reaction(&self, user: &UserId, post: &PostId) -> Result<bool, StoreError>;
    async fn find_reactions(
        &self,
        user: &UserId,
        posts: &[PostId],
    ) -> Result<Vec<Reaction>, StoreError>;
    /// The user's reactions, newest reaction first.
    async fn list_reactions(
        &self,
        user: &UserId,
        before: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Reaction>, StoreError>;

    // -- follows --
    async fn insert_follow(&self, follower: &UserId, followee: &UserId)
        -> Result<bool, StoreError>;
    async fn delete_follow(&self, follower: &UserId, followee: &UserId)
        -> Result<bool, StoreError>;
    async fn follow_exists(&self, follower: &UserId, followee: &UserId)
        -> Result<bool, StoreError>;
    async fn followee_ids(&self, follower: &UserId) -> Result<Vec<UserId>, StoreError>;

    // -- bookmarks --
    async fn insert_bookmark(&self, user: &UserId, post: &PostId) -> Result<bool, StoreError>;
    async fn delete_bookmark(&self, user: &UserId, post: &PostId) -> Result<bool, StoreError>;
    async fn bookmarked_among(
        &self,
        user: &UserId,
        posts: &[PostId],
    ) -> Result<Vec<PostId>, StoreError>;
    /// The user's bookmarks, newest bookmark first.
    async fn list_bookmarks(
        &self,
        user: &UserId,
        before: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Bookmark>, StoreError>;

    // -- notifications --
    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError>;
    async fn list_notifications(
        &self,
        recipient: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;
    async fn count_unread_notifications(&self, recipient: &UserId) -> Result<u64, StoreError>;
    /// Marks one unread notification of `recipient` read; false when there
    /// was no such unread notification.
    async fn mark_notification_read(
        &self,
        id: &NotificationId,
        recipient: &UserId,
    ) -> Result<bool, StoreError>;
    async fn mark_all_notifications_read(&self, recipient: &UserId) -> Result<u64, StoreError>;

    // -- drafts --
    async fn insert_draft(&self, draft: &Draft) -> Result<(), StoreError>;
    async fn list_drafts(&self, author: &UserId) -> Result<Vec<Draft>, StoreError>;
    async fn delete_draft(&self, id: &DraftId, author: &UserId) -> Result<bool, StoreError>;
}

pub type DynContentStore = Arc<dyn ContentStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_text_form() {
        let at = crate::db::parse_timestamp("2025-03-01T12:00:00.250000Z").unwrap();
        let post = PostId::generate();
        let cursor = Cursor::new(at, post.clone());

        let raw = cursor.to_string();
        assert_eq!(raw, format!("2025-03-01T12:00:00.250000Z_{}", post));
        assert_eq!(Cursor::parse(&raw), Some(cursor));
        let bare = crate::db::parse_timestamp("2025-03-01T12:00:00Z").unwrap();
        assert_eq!(Cursor::parse("2025-03-01T12:00:00Z"), Some(Cursor::at(bare)));
        assert!(Cursor::parse("2025-03-01T12:00:00Z_not-an-id").is_none());
        assert!(Cursor::parse("yesterday").is_none());
    }
}
