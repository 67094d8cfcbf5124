// Domain types - ids, tagged post variants, reaction and notification kinds
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh time-ordered id.
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            /// Parse an id supplied by a client. Anything that is not a UUID
            /// is a validation error, never a lookup miss.
            pub fn parse(raw: &str) -> Result<Self, AppError> {
                uuid::Uuid::parse_str(raw.trim())
                    .map(|u| Self(u.to_string()))
                    .map_err(|_| AppError::Validation(format!("Invalid {}", $label)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(UserId, "user ID");
id_type!(PostId, "post ID");
id_type!(NotificationId, "notification ID");
id_type!(DraftId, "draft ID");

/// What a post row is. Replies point at their parent, reposts at their
/// origin; an origin is never itself a repost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostKind {
    Original,
    Reply { parent_id: PostId },
    Repost { origin_id: PostId },
}

impl PostKind {
    pub fn from_columns(parent_id: Option<String>, repost_of: Option<String>) -> Self {
        match (parent_id, repost_of) {
            (_, Some(origin)) => Self::Repost {
                origin_id: PostId(origin),
            },
            (Some(parent), None) => Self::Reply {
                parent_id: PostId(parent),
            },
            (None, None) => Self::Original,
        }
    }

    pub fn parent_id(&self) -> Option<&PostId> {
        match self {
            Self::Reply { parent_id } => Some(parent_id),
            _ => None,
        }
    }

    pub fn origin_id(&self) -> Option<&PostId> {
        match self {
            Self::Repost { origin_id } => Some(origin_id),
            _ => None,
        }
    }

    pub fn is_repost(&self) -> bool {
        matches!(self, Self::Repost { .. })
    }

    pub fn is_top_level(&self) -> bool {
        !matches!(self, Self::Reply { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub const ALL: [ReactionType; 6] = [
        Self::Like,
        Self::Love,
        Self::Laugh,
        Self::Wow,
        Self::Sad,
        Self::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Love => "love",
            Self::Laugh => "laugh",
            Self::Wow => "wow",
            Self::Sad => "sad",
            Self::Angry => "angry",
        }
    }

    /// Read-time interpretation of a stored column. Rows written before
    /// reaction types existed have no type and count as a plain like.
    pub fn from_stored(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or(Self::Like)
    }
}

impl FromStr for ReactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::Validation("Invalid reaction type".into()))
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Reply,
    Repost,
    Follow,
    Mention,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Reply => "reply",
            Self::Repost => "repost",
            Self::Follow => "follow",
            Self::Mention => "mention",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "reply" => Ok(Self::Reply),
            "repost" => Ok(Self::Repost),
            "follow" => Ok(Self::Follow),
            "mention" => Ok(Self::Mention),
            other => Err(AppError::Validation(format!(
                "Unknown notification type: {}",
                other
            ))),
        }
    }
}

/// Handles are 3-15 characters of lowercase letters, digits and underscores.
pub fn is_valid_handle(handle: &str) -> bool {
    (3..=15).contains(&handle.len())
        && handle
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

pub fn validate_handle(handle: &str) -> Result<(), AppError> {
    if is_valid_handle(handle) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Handle must be 3-15 characters, lowercase letters, numbers, and underscores only"
                .into(),
        ))
    }
}

/// Optional profile/media URL: empty is allowed, anything else must be
/// an absolute http(s) URL.
pub fn is_valid_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Image reference on a post or profile: an absolute http(s) URL, or a
/// file served from the local upload store (`/media/<file>`).
pub fn is_valid_image_ref(raw: &str) -> bool {
    if let Some(rest) = raw.strip_prefix(crate::media::MEDIA_PREFIX) {
        return match rest.strip_prefix('/') {
            Some(file) => {
                !file.is_empty()
                    && !file.contains(['/', '\\', '?', '#'])
                    && file != "."
                    && !file.contains("..")
            }
            None => false,
        };
    }
    is_valid_http_url(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(matches!(
            PostId::parse("not-an-id"),
            Err(AppError::Validation(_))
        ));
        let id = PostId::generate();
        assert_eq!(PostId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn post_kind_from_columns() {
        assert_eq!(PostKind::from_columns(None, None), PostKind::Original);
        assert!(PostKind::from_columns(None, Some("p".into())).is_repost());
        let reply = PostKind::from_columns(Some("p".into()), None);
        assert_eq!(reply.parent_id(), Some(&PostId::new("p")));
        assert!(!reply.is_top_level());
    }

    #[test]
    fn untyped_reaction_reads_as_like() {
        assert_eq!(ReactionType::from_stored(None), ReactionType::Like);
        assert_eq!(ReactionType::from_stored(Some("wow")), ReactionType::Wow);
        assert_eq!(ReactionType::from_stored(Some("bogus")), ReactionType::Like);
    }

    #[test]
    fn reaction_type_parse() {
        assert_eq!("angry".parse::<ReactionType>().unwrap(), ReactionType::Angry);
        assert!("heart".parse::<ReactionType>().is_err());
    }

    #[test]
    fn handle_rules() {
        assert!(is_valid_handle("bob"));
        assert!(is_valid_handle("a_b_123456789_0"));
        assert!(!is_valid_handle("ab"));
        assert!(!is_valid_handle("Alice"));
        assert!(!is_valid_handle("a_b_123456789_01"));
        assert!(!is_valid_handle("bad-handle"));
    }

    #[test]
    fn http_urls_only() {
        assert!(is_valid_http_url("https://img.example/a.png"));
        assert!(is_valid_http_url("http://example.com"));
        assert!(!is_valid_http_url("ftp://example.com/a.png"));
        assert!(!is_valid_http_url("not a url"));
    }

    #[test]
    fn uploaded_media_paths_are_image_refs() {
        assert!(is_valid_image_ref("/media/0190a1b2-c3d4.png"));
        assert!(is_valid_image_ref("https://img.example/a.png"));
        assert!(!is_valid_image_ref("/media/"));
        assert!(!is_valid_image_ref("/media"));
        assert!(!is_valid_image_ref("/media/../secrets.db"));
        assert!(!is_valid_image_ref("/media/a/b.png"));
        assert!(!is_valid_image_ref("/mediax/a.png"));
        assert!(!is_valid_image_ref("/etc/passwd"));
    }
}
