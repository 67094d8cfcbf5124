// Live broadcast channel - fire-and-forget fan-out to SSE subscribers
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::social::domain::{PostId, UserId};

/// Event name for post counter updates on `post-{id}` channels.
pub const POST_UPDATED: &str = "updated";
/// Event name for notifications on `user-{id}` channels.
pub const NOTIFICATION: &str = "notification";

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("Publish failed: {0}")]
    Publish(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

#[async_trait]
pub trait LiveBroadcast: Send + Sync {
    async fn publish(&self, channel: &str, event: &str, payload: Value) -> Result<(), LiveError>;
}

pub type DynLiveBroadcast = Arc<dyn LiveBroadcast>;

pub fn post_channel(id: &PostId) -> String {
    format!("post-{}", id)
}

pub fn user_channel(id: &UserId) -> String {
    format!("user-{}", id)
}

/// In-process hub backed by a tokio broadcast channel. Every subscriber
/// sees every event and filters by channel.
pub struct LiveHub {
    sender: broadcast::Sender<LiveEvent>,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl LiveBroadcast for LiveHub {
    async fn publish(&self, channel: &str, event: &str, payload: Value) -> Result<(), LiveError> {
        let live_event = LiveEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        };
        // No subscribers is not a failure
        if self.sender.send(live_event).is_err() {
            tracing::debug!(channel, event, "No live subscribers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = LiveHub::new(16);
        let mut rx = hub.subscribe();

        hub.publish("post-1", POST_UPDATED, serde_json::json!({ "likesCount": 1 }))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel, "post-1");
        assert_eq!(event.event, "updated");
        assert_eq!(event.payload["likesCount"], 1);
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let hub = LiveHub::new(16);
        assert!(hub
            .publish("user-1", NOTIFICATION, Value::Null)
            .await
            .is_ok());
    }

    #[test]
    fn channel_names() {
        assert_eq!(post_channel(&PostId::new("abc")), "post-abc");
        assert_eq!(user_channel(&UserId::new("u1")), "user-u1");
    }
}
