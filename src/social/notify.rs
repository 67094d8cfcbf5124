//! Notification fan-out and live counter broadcast.
//!
//! Both are side effects of a mutation that already succeeded: failures are
//! logged and swallowed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::db::{self, models::Notification, models::Post, models::PostCounters};
use crate::error::{AppError, AppResult};
use crate::live::{self, DynLiveBroadcast};
use crate::social::domain::{NotificationId, NotificationKind, PostId, UserId};
use crate::social::store::DynContentStore;
use crate::social::views::AuthorSummary;

pub const NOTIFICATION_CAP: usize = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPostPreview {
    pub id: PostId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub actor: AuthorSummary,
    pub post_id: Option<PostId>,
    pub post: Option<NotificationPostPreview>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Notifier {
    store: DynContentStore,
    live: DynLiveBroadcast,
}

impl Notifier {
    pub fn new(store: DynContentStore, live: DynLiveBroadcast) -> Self {
        Self { store, live }
    }

    /// Records a notification and pushes it to the recipient's channel.
    /// Returns whether a notification was written.
    pub async fn notify(
        &self,
        recipient: &UserId,
        actor: &UserId,
        kind: NotificationKind,
        post: Option<&PostId>,
    ) -> bool {
        if recipient == actor {
            return false;
        }
        match self.try_notify(recipient, actor, kind, post).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(
                    recipient = %recipient,
                    kind = kind.as_str(),
                    "Failed to create notification: {}",
                    e
                );
                false
            }
        }
    }

    async fn try_notify(
        &self,
        recipient: &UserId,
        actor: &UserId,
        kind: NotificationKind,
        post: Option<&PostId>,
    ) -> AppResult<bool> {
        let Some(actor_user) = self.store.find_user(actor).await? else {
            return Ok(false);
        };

        let notification = Notification {
            id: NotificationId::generate(),
            recipient_id: recipient.clone(),
            actor_id: actor.clone(),
            kind,
            post_id: post.cloned(),
            is_read: false,
            created_at: db::now(),
        };
        self.store.insert_notification(&notification).await?;

        let summary = AuthorSummary::from(&actor_user);
        let payload = serde_json::json!({
            "type": kind,
            "actor": {
                "name": summary.shown_name(),
                "handle": summary.handle,
                "avatarUrl": summary.avatar_url,
            },
            "postId": post,
        });
        if let Err(e) = self
            .live
            .publish(&live::user_channel(recipient), live::NOTIFICATION, payload)
            .await
        {
            tracing::warn!(recipient = %recipient, "Notification push failed: {}", e);
        }
        Ok(true)
    }

    /// Pushes the post's current counters to its channel.
    pub async fn broadcast_counters(&self, post: &Post) {
        let counters = PostCounters::from(post);
        let payload = match serde_json::to_value(counters) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(post = %post.id, "Failed to encode counters: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .live
            .publish(&live::post_channel(&post.id), live::POST_UPDATED, payload)
            .await
        {
            tracing::warn!(post = %post.id, "Counter broadcast failed: {}", e);
        }
    }

    /// The recipient's newest notifications, with actor and post previews.
    pub async fn list(&self, recipient: &UserId) -> AppResult<Vec<NotificationView>> {
        let notifications = self
            .store
            .list_notifications(recipient, NOTIFICATION_CAP)
            .await?;

        let mut actor_ids: Vec<UserId> = Vec::new();
        let mut post_ids: Vec<PostId> = Vec::new();
        for n in &notifications {
            if !actor_ids.contains(&n.actor_id) {
                actor_ids.push(n.actor_id.clone());
            }
            if let Some(id) = &n.post_id {
                if !post_ids.contains(id) {
                    post_ids.push(id.clone());
                }
            }
        }

        let actors: HashMap<_, _> = self
            .store
            .find_users(&actor_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let posts: HashMap<_, _> = self
            .store
            .find_posts_by_ids(&post_ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Ok(notifications
            .into_iter()
            .map(|n| NotificationView {
                actor: AuthorSummary::or_unknown(actors.get(&n.actor_id), &n.actor_id),
                post: n
                    .post_id
                    .as_ref()
                    .and_then(|id| posts.get(id))
                    .map(|p| NotificationPostPreview {
                        id: p.id.clone(),
                        text: p.text.clone(),
                    }),
                id: n.id,
                kind: n.kind,
                post_id: n.post_id,
                is_read: n.is_read,
                created_at: n.created_at,
            })
            .collect())
    }

    pub async fn unread_count(&self, recipient: &UserId) -> AppResult<u64> {
        Ok(self.store.count_unread_notifications(recipient).await?)
    }

    pub async fn mark_read(&self, id: &NotificationId, recipient: &UserId) -> AppResult<()> {
        if self.store.mark_notification_read(id, recipient).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(
                "Notification not found or already read".into(),
            ))
        }
    }

    pub async fn mark_all_read(&self, recipient: &UserId) -> AppResult<u64> {
        Ok(self.store.mark_all_notifications_read(recipient).await?)
    }
}
