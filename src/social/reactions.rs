//! Reaction ledger: at most one reaction per (user, post).
//!
//! The post's `likes_count` tracks presence of a reaction row only, so
//! switching emoji never moves the counter.

use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::social::domain::{PostId, ReactionType, UserId};
use crate::social::store::{DynContentStore, ReactionWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChange {
    /// No reaction existed; one was created.
    Added,
    /// The existing reaction's type was overwritten in place.
    Replaced,
    /// The same type was re-applied.
    Unchanged,
}

impl ReactionChange {
    pub fn counter_delta(&self) -> i64 {
        match self {
            Self::Added => 1,
            Self::Replaced | Self::Unchanged => 0,
        }
    }
}

impl From<ReactionWrite> for ReactionChange {
    fn from(write: ReactionWrite) -> Self {
        match write {
            ReactionWrite::Inserted => Self::Added,
            ReactionWrite::Updated => Self::Replaced,
            ReactionWrite::Unchanged => Self::Unchanged,
        }
    }
}

#[derive(Clone)]
pub struct ReactionLedger {
    store: DynContentStore,
}

impl ReactionLedger {
    pub fn new(store: DynContentStore) -> Self {
        Self { store }
    }

    pub async fn set_reaction(
        &self,
        user: &UserId,
        post: &PostId,
        kind: ReactionType,
    ) -> AppResult<ReactionChange> {
        let write = self.store.write_reaction(user, post, kind).await?;
        Ok(write.into())
    }

    /// Plain like: only valid when the user holds no reaction at all.
    pub async fn add_like(&self, user: &UserId, post: &PostId) -> AppResult<ReactionChange> {
        if self
            .store
            .insert_reaction_if_absent(user, post, ReactionType::Like)
            .await?
        {
            Ok(ReactionChange::Added)
        } else {
            Err(AppError::Conflict("Already liked".into()))
        }
    }

    /// Removes the reaction; the returned delta is always -1.
    pub async fn clear_reaction(&self, user: &UserId, post: &PostId) -> AppResult<i64> {
        if self.store.delete_reaction(user, post).await? {
            Ok(-1)
        } else {
            Err(AppError::NotFound("Reaction not found".into()))
        }
    }

    /// Batch lookup for annotation. Absent entries mean "no reaction".
    pub async fn user_reaction_map(
        &self,
        user: &UserId,
        posts: &[PostId],
    ) -> AppResult<HashMap<PostId, ReactionType>> {
        let reactions = self.store.find_reactions(user, posts).await?;
        Ok(reactions.into_iter().map(|r| (r.post_id, r.kind)).collect())
    }
}
