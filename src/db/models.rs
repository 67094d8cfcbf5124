use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::social::domain::{
    DraftId, NotificationId, NotificationKind, PostId, PostKind, ReactionType, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub handle: String,
    pub name: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub bio: String,
    pub provider: String,
    pub provider_account_id: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub handle: String,
    pub name: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: String,
    pub provider_account_id: String,
}

/// Profile edit. `None` leaves a field untouched; an empty string clears
/// an optional URL.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub kind: PostKind,
    pub text: String,
    pub urls: Vec<String>,
    pub video_urls: Vec<String>,
    pub images: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<UserId>,
    pub likes_count: i64,
    pub replies_count: i64,
    pub reposts_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// The post that likes, reposts and bookmarks land on: a repost's origin,
    /// otherwise the post itself.
    pub fn action_target(&self) -> &PostId {
        self.kind.origin_id().unwrap_or(&self.id)
    }

    /// A repost row for `origin` by `author`, carrying the origin's text,
    /// links, tags and mentions but none of its media.
    pub fn repost_of(origin: &Post, author: UserId, now: DateTime<Utc>) -> Post {
        Post {
            id: PostId::generate(),
            author_id: author,
            kind: PostKind::Repost {
                origin_id: origin.id.clone(),
            },
            text: origin.text.clone(),
            urls: origin.urls.clone(),
            video_urls: Vec::new(),
            images: Vec::new(),
            hashtags: origin.hashtags.clone(),
            mentions: origin.mentions.clone(),
            likes_count: 0,
            replies_count: 0,
            reposts_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCounters {
    pub likes_count: i64,
    pub replies_count: i64,
    pub reposts_count: i64,
}

impl From<&Post> for PostCounters {
    fn from(post: &Post) -> Self {
        Self {
            likes_count: post.likes_count,
            replies_count: post.replies_count,
            reposts_count: post.reposts_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reaction {
    pub user_id: UserId,
    pub post_id: PostId,
    pub kind: ReactionType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Bookmark {
    pub user_id: UserId,
    pub post_id: PostId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub actor_id: UserId,
    pub kind: NotificationKind,
    pub post_id: Option<PostId>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: DraftId,
    pub author_id: UserId,
    pub text: String,
    pub urls: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
