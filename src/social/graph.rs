//! Social graph index over the follows relation.
//!
//! Follow edges are directed and unique per ordered pair. Creating or
//! removing an edge adjusts both endpoints' denormalized counters.

use crate::error::{AppError, AppResult};
use crate::social::domain::UserId;
use crate::social::store::{DynContentStore, UserCounter};

#[derive(Clone)]
pub struct SocialGraph {
    store: DynContentStore,
}

impl SocialGraph {
    pub fn new(store: DynContentStore) -> Self {
        Self { store }
    }

    /// Everyone `viewer` follows.
    pub async fn followees(&self, viewer: &UserId) -> AppResult<Vec<UserId>> {
        Ok(self.store.followee_ids(viewer).await?)
    }

    pub async fn is_following(&self, follower: &UserId, followee: &UserId) -> AppResult<bool> {
        if follower == followee {
            return Ok(false);
        }
        Ok(self.store.follow_exists(follower, followee).await?)
    }

    /// Authors visible on the following tab: the viewer plus followees.
    /// With no followees this is the viewer alone.
    pub async fn following_authors(&self, viewer: &UserId) -> AppResult<Vec<UserId>> {
        let mut authors = vec![viewer.clone()];
        authors.extend(
            self.followees(viewer)
                .await?
                .into_iter()
                .filter(|id| id != viewer),
        );
        Ok(authors)
    }

    pub async fn follow(&self, follower: &UserId, followee: &UserId) -> AppResult<()> {
        if follower == followee {
            return Err(AppError::Validation("Cannot follow yourself".into()));
        }
        if !self.store.insert_follow(follower, followee).await? {
            return Err(AppError::Conflict("Already following".into()));
        }

        self.store
            .increment_user_counter(follower, UserCounter::Following, 1)
            .await?;
        self.store
            .increment_user_counter(followee, UserCounter::Followers, 1)
            .await?;
        Ok(())
    }

    pub async fn unfollow(&self, follower: &UserId, followee: &UserId) -> AppResult<()> {
        if !self.store.delete_follow(follower, followee).await? {
            return Err(AppError::NotFound("Not following".into()));
        }

        self.store
            .increment_user_counter(follower, UserCounter::Following, -1)
            .await?;
        self.store
            .increment_user_counter(followee, UserCounter::Followers, -1)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::testing::Fixture;

    #[tokio::test]
    async fn follow_adjusts_both_counters() {
        let fx = Fixture::new();
        let graph = SocialGraph::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;

        graph.follow(&alice.id, &bob.id).await.unwrap();

        assert!(graph.is_following(&alice.id, &bob.id).await.unwrap());
        assert_eq!(fx.reload_user(&alice.id).await.following_count, 1);
        assert_eq!(fx.reload_user(&bob.id).await.followers_count, 1);

        graph.unfollow(&alice.id, &bob.id).await.unwrap();
        assert_eq!(fx.reload_user(&alice.id).await.following_count, 0);
        assert_eq!(fx.reload_user(&bob.id).await.followers_count, 0);
    }

    #[tokio::test]
    async fn duplicate_follow_conflicts_and_missing_unfollow_is_not_found() {
        let fx = Fixture::new();
        let graph = SocialGraph::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;

        graph.follow(&alice.id, &bob.id).await.unwrap();
        let again = graph.follow(&alice.id, &bob.id).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(fx.reload_user(&bob.id).await.followers_count, 1);

        graph.unfollow(&alice.id, &bob.id).await.unwrap();
        let missing = graph.unfollow(&alice.id, &bob.id).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn self_follow_is_rejected() {
        let fx = Fixture::new();
        let graph = SocialGraph::new(fx.store.clone());
        let alice = fx.user("alice").await;

        let result = graph.follow(&alice.id, &alice.id).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn following_authors_degrades_to_self() {
        let fx = Fixture::new();
        let graph = SocialGraph::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;

        assert_eq!(
            graph.following_authors(&alice.id).await.unwrap(),
            vec![alice.id.clone()]
        );

        graph.follow(&alice.id, &bob.id).await.unwrap();
        assert_eq!(
            graph.following_authors(&alice.id).await.unwrap(),
            vec![alice.id.clone(), bob.id.clone()]
        );
    }
}
