// View models returned to clients
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{Post, User};
use crate::social::domain::{PostId, ReactionType, UserId};
use crate::social::text;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: UserId,
    pub handle: String,
    pub name: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl AuthorSummary {
    /// Stand-in for an author record that no longer resolves.
    pub fn unknown(id: &UserId) -> Self {
        Self {
            id: id.clone(),
            handle: "unknown".into(),
            name: "Unknown".into(),
            display_name: None,
            avatar_url: None,
        }
    }

    pub fn or_unknown(user: Option<&User>, id: &UserId) -> Self {
        user.map(Self::from).unwrap_or_else(|| Self::unknown(id))
    }

    /// Name shown in notifications: display name when set.
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            handle: user.handle.clone(),
            name: user.name.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Post content without per-viewer action state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedPost {
    pub id: PostId,
    pub author: AuthorSummary,
    pub text: String,
    pub urls: Vec<String>,
    pub video_urls: Vec<String>,
    pub video_embeds: Vec<String>,
    pub images: Vec<String>,
    pub hashtags: Vec<String>,
    pub parent_id: Option<PostId>,
    pub likes_count: i64,
    pub replies_count: i64,
    pub reposts_count: i64,
    pub created_at: DateTime<Utc>,
}

impl EmbeddedPost {
    pub fn new(post: &Post, author: AuthorSummary) -> Self {
        Self {
            id: post.id.clone(),
            author,
            text: post.text.clone(),
            urls: post.urls.clone(),
            video_urls: post.video_urls.clone(),
            video_embeds: post
                .video_urls
                .iter()
                .filter_map(|u| text::youtube_embed_url(u))
                .collect(),
            images: post.images.clone(),
            hashtags: post.hashtags.clone(),
            parent_id: post.kind.parent_id().cloned(),
            likes_count: post.likes_count,
            replies_count: post.replies_count,
            reposts_count: post.reposts_count,
            created_at: post.created_at,
        }
    }
}

/// A feed entry with the viewer's action state. For a repost the actions
/// describe the origin, which is what likes and bookmarks land on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: EmbeddedPost,
    pub is_repost: bool,
    pub repost_of: Option<EmbeddedPost>,
    pub is_liked: bool,
    pub current_reaction: Option<ReactionType>,
    pub is_reposted: bool,
    pub is_bookmarked: bool,
    pub is_own: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub author: AuthorSummary,
    pub banner_url: Option<String>,
    pub bio: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: u64,
    pub created_at: DateTime<Utc>,
    pub is_following: bool,
    pub is_own_profile: bool,
}
