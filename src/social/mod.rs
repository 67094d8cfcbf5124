pub mod actions;
pub mod domain;
pub mod drafts;
pub mod feed;
pub mod graph;
pub mod notify;
pub mod profile;
pub mod reactions;
pub mod reposts;
pub mod store;
pub mod text;
pub mod views;

pub use actions::{Compose, SocialActions};
pub use domain::{NotificationKind, PostId, PostKind, ReactionType, UserId};
pub use feed::{Feed, FeedAssembler, HomeTab, Page};
pub use graph::SocialGraph;
pub use notify::Notifier;
pub use reactions::{ReactionChange, ReactionLedger};
pub use reposts::RepostResolver;
pub use store::{ContentStore, Cursor, DynContentStore, SqliteContentStore, StoreError};

#[cfg(test)]
pub(crate) mod testing;
