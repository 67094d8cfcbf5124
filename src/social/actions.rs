//! Mutation handlers.
//!
//! Each handler runs validate, check state, primary write, counter adjust,
//! then broadcast / notify. There is no cross-record transaction: a failed
//! counter update after a successful primary write is left as drift.
//! Likes, reactions, reposts and bookmarks aimed at a repost land on its
//! origin.

use crate::db::{self, models::Post, models::PostCounters, models::User};
use crate::error::{AppError, AppResult};
use crate::live::DynLiveBroadcast;
use crate::social::domain::{NotificationKind, PostId, PostKind, ReactionType, UserId};
use crate::social::graph::SocialGraph;
use crate::social::notify::Notifier;
use crate::social::reactions::{ReactionChange, ReactionLedger};
use crate::social::store::{DynContentStore, PostCounter, PostQuery};
use crate::social::text;

/// Body of a new post or reply.
#[derive(Debug, Clone, Default)]
pub struct Compose {
    pub text: String,
    pub images: Vec<String>,
}

#[derive(Clone)]
pub struct SocialActions {
    store: DynContentStore,
    graph: SocialGraph,
    ledger: ReactionLedger,
    notifier: Notifier,
}

impl SocialActions {
    pub fn new(store: DynContentStore, live: DynLiveBroadcast) -> Self {
        Self {
            graph: SocialGraph::new(store.clone()),
            ledger: ReactionLedger::new(store.clone()),
            notifier: Notifier::new(store.clone(), live),
            store,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    async fn find_post(&self, id: &PostId) -> AppResult<Post> {
        self.store
            .find_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".into()))
    }

    /// The post an action on `id` applies to.
    async fn action_target(&self, id: &PostId) -> AppResult<Post> {
        let post = self.find_post(id).await?;
        match post.kind.origin_id() {
            Some(origin) => self
                .store
                .find_post(origin)
                .await?
                .ok_or_else(|| AppError::NotFound("Original post not found".into())),
            None => Ok(post),
        }
    }

    async fn user_by_handle(&self, handle: &str) -> AppResult<User> {
        self.store
            .find_user_by_handle(handle)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn adjust(&self, post: &PostId, counter: PostCounter, delta: i64) -> AppResult<PostCounters> {
        if delta != 0 {
            self.store.increment_post_counter(post, counter, delta).await?;
        }
        let updated = self.find_post(post).await?;
        self.notifier.broadcast_counters(&updated).await;
        Ok(PostCounters::from(&updated))
    }

    /// Original post, or a reply when `parent` is set.
    pub async fn create_post(
        &self,
        author: &UserId,
        body: Compose,
        parent: Option<&PostId>,
    ) -> AppResult<Post> {
        text::validate_post_body(&body.text, &body.images)?;

        let parent_post = match parent {
            Some(id) => Some(self.action_target(id).await.map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Parent post not found".into()),
                other => other,
            })?),
            None => None,
        };

        let extracted = text::extract(&body.text);
        let (urls, video_urls) = text::partition_urls(extracted.urls);
        let mentioned = self
            .store
            .find_users_by_handles(&extracted.mentions)
            .await?;

        let now = db::now();
        let post = Post {
            id: PostId::generate(),
            author_id: author.clone(),
            kind: match &parent_post {
                Some(p) => PostKind::Reply {
                    parent_id: p.id.clone(),
                },
                None => PostKind::Original,
            },
            text: body.text,
            urls,
            video_urls,
            images: body.images,
            hashtags: extracted.hashtags,
            mentions: mentioned.iter().map(|u| u.id.clone()).collect(),
            likes_count: 0,
            replies_count: 0,
            reposts_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_post(&post).await?;
        tracing::info!(post = %post.id, author = %author, "Post created");

        if let Some(parent) = &parent_post {
            self.adjust(&parent.id, PostCounter::Replies, 1).await?;
            self.notifier
                .notify(&parent.author_id, author, NotificationKind::Reply, Some(&parent.id))
                .await;
        }
        for user in &mentioned {
            self.notifier
                .notify(&user.id, author, NotificationKind::Mention, Some(&post.id))
                .await;
        }

        Ok(post)
    }

    pub async fn reply(&self, author: &UserId, parent: &PostId, body: Compose) -> AppResult<Post> {
        self.create_post(author, body, Some(parent)).await
    }

    pub async fn delete_post(&self, requester: &UserId, id: &PostId) -> AppResult<()> {
        let post = self.find_post(id).await?;
        if &post.author_id != requester {
            return Err(AppError::Forbidden(
                "Not authorized to delete this post".into(),
            ));
        }
        if post.kind.is_repost() {
            return Err(AppError::InvalidOperation(
                "Cannot delete repost; unrepost it instead".into(),
            ));
        }

        if !self.store.delete_post(id).await? {
            return Err(AppError::NotFound("Post not found".into()));
        }
        tracing::info!(post = %id, "Post deleted");

        if let Some(parent) = post.kind.parent_id() {
            if let Err(e) = self.adjust(parent, PostCounter::Replies, -1).await {
                tracing::warn!(parent = %parent, "Parent counter not adjusted: {}", e);
            }
        }
        Ok(())
    }

    pub async fn like(&self, user: &UserId, id: &PostId) -> AppResult<PostCounters> {
        let target = self.action_target(id).await?;
        let change = self.ledger.add_like(user, &target.id).await?;
        let counters = self
            .adjust(&target.id, PostCounter::Likes, change.counter_delta())
            .await?;
        self.notifier
            .notify(&target.author_id, user, NotificationKind::Like, Some(&target.id))
            .await;
        Ok(counters)
    }

    pub async fn unlike(&self, user: &UserId, id: &PostId) -> AppResult<PostCounters> {
        let target = self.action_target(id).await?;
        let delta = self
            .ledger
            .clear_reaction(user, &target.id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Not liked".into()),
                other => other,
            })?;
        self.adjust(&target.id, PostCounter::Likes, delta).await
    }

    /// Set or replace the reaction. Only a new reaction notifies the author.
    pub async fn react(
        &self,
        user: &UserId,
        id: &PostId,
        kind: ReactionType,
    ) -> AppResult<(ReactionChange, PostCounters)> {
        let target = self.action_target(id).await?;
        let change = self.ledger.set_reaction(user, &target.id, kind).await?;
        let counters = self
            .adjust(&target.id, PostCounter::Likes, change.counter_delta())
            .await?;
        if change == ReactionChange::Added {
            self.notifier
                .notify(&target.author_id, user, NotificationKind::Like, Some(&target.id))
                .await;
        }
        Ok((change, counters))
    }

    pub async fn unreact(&self, user: &UserId, id: &PostId) -> AppResult<PostCounters> {
        let target = self.action_target(id).await?;
        let delta = self.ledger.clear_reaction(user, &target.id).await?;
        self.adjust(&target.id, PostCounter::Likes, delta).await
    }

    /// Reposting a repost reposts its origin.
    pub async fn repost(&self, user: &UserId, id: &PostId) -> AppResult<PostCounters> {
        let origin = self.action_target(id).await?;
        let repost = Post::repost_of(&origin, user.clone(), db::now());
        self.store.insert_post(&repost).await?;
        tracing::info!(origin = %origin.id, user = %user, "Reposted");

        let counters = self.adjust(&origin.id, PostCounter::Reposts, 1).await?;
        self.notifier
            .notify(&origin.author_id, user, NotificationKind::Repost, Some(&origin.id))
            .await;
        Ok(counters)
    }

    pub async fn unrepost(&self, user: &UserId, id: &PostId) -> AppResult<PostCounters> {
        let origin = self.action_target(id).await?;
        let existing = self
            .store
            .find_posts(&PostQuery::reposts_by(user.clone(), vec![origin.id.clone()]))
            .await?;
        let repost = existing
            .first()
            .ok_or_else(|| AppError::NotFound("Repost not found".into()))?;

        if !self.store.delete_post(&repost.id).await? {
            return Err(AppError::NotFound("Repost not found".into()));
        }
        self.adjust(&origin.id, PostCounter::Reposts, -1).await
    }

    pub async fn follow(&self, follower: &UserId, handle: &str) -> AppResult<User> {
        let followee = self.user_by_handle(handle).await?;
        self.graph.follow(follower, &followee.id).await?;
        tracing::info!(follower = %follower, followee = %followee.id, "Followed");

        self.notifier
            .notify(&followee.id, follower, NotificationKind::Follow, None)
            .await;
        Ok(followee)
    }

    pub async fn unfollow(&self, follower: &UserId, handle: &str) -> AppResult<User> {
        let followee = self.user_by_handle(handle).await?;
        self.graph.unfollow(follower, &followee.id).await?;
        Ok(followee)
    }

    pub async fn bookmark(&self, user: &UserId, id: &PostId) -> AppResult<()> {
        let target = self.action_target(id).await?;
        if !self.store.insert_bookmark(user, &target.id).await? {
            return Err(AppError::Conflict("Already bookmarked".into()));
        }
        Ok(())
    }

    pub async fn unbookmark(&self, user: &UserId, id: &PostId) -> AppResult<()> {
        let target = self.action_target(id).await?;
        if !self.store.delete_bookmark(user, &target.id).await? {
            return Err(AppError::NotFound("Bookmark not found".into()));
        }
        Ok(())
    }
}
