//! Repost resolution and window deduplication.
//!
//! An original is hidden from a result window when a repost of it appears
//! in the same window. Reposts themselves are always shown.

use std::collections::{HashMap, HashSet};

use crate::db::models::{Post, User};
use crate::error::AppResult;
use crate::social::domain::{PostId, UserId};
use crate::social::store::DynContentStore;

/// Origin ids referenced by reposts inside `window`.
pub fn in_window_origins(window: &[Post]) -> HashSet<PostId> {
    window
        .iter()
        .filter_map(|p| p.kind.origin_id().cloned())
        .collect()
}

/// Keep a candidate if it is a repost or no repost of it is in the window.
pub fn keep(post: &Post, in_window: &HashSet<PostId>) -> bool {
    post.kind.is_repost() || !in_window.contains(&post.id)
}

/// Drops originals shadowed by an in-window repost, preserving order.
pub fn dedup(window: Vec<Post>) -> Vec<Post> {
    let in_window = in_window_origins(&window);
    window.into_iter().filter(|p| keep(p, &in_window)).collect()
}

/// Origins and authors for one result window.
#[derive(Debug, Default)]
pub struct Resolution {
    pub origins: HashMap<PostId, Post>,
    pub authors: HashMap<UserId, User>,
}

impl Resolution {
    pub fn origin(&self, id: &PostId) -> Option<&Post> {
        self.origins.get(id)
    }

    pub fn author(&self, id: &UserId) -> Option<&User> {
        self.authors.get(id)
    }
}

#[derive(Clone)]
pub struct RepostResolver {
    store: DynContentStore,
}

impl RepostResolver {
    pub fn new(store: DynContentStore) -> Self {
        Self { store }
    }

    /// Batch-resolves every repost's origin and every author in the window
    /// (candidates and origins) in two round trips.
    pub async fn resolve(&self, window: &[Post]) -> AppResult<Resolution> {
        let mut origin_ids: Vec<PostId> = Vec::new();
        for id in window.iter().filter_map(|p| p.kind.origin_id()) {
            if !origin_ids.contains(id) {
                origin_ids.push(id.clone());
            }
        }

        let origins: HashMap<PostId, Post> = self
            .store
            .find_posts_by_ids(&origin_ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut author_ids: Vec<UserId> = Vec::new();
        for id in window
            .iter()
            .map(|p| &p.author_id)
            .chain(origins.values().map(|p| &p.author_id))
        {
            if !author_ids.contains(id) {
                author_ids.push(id.clone());
            }
        }

        let authors = self
            .store
            .find_users(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(Resolution { origins, authors })
    }
}
