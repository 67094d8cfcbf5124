// Shared fixtures for the social service tests
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::db::{self, models::NewUser, models::Post, models::User};
use crate::live::{DynLiveBroadcast, LiveBroadcast, LiveError, LiveEvent};
use crate::social::domain::{PostId, PostKind, UserId};
use crate::social::store::{DynContentStore, SqliteContentStore};

pub struct Fixture {
    pub store: DynContentStore,
    pub live: Arc<RecordingBroadcast>,
    _temp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let pool = db::create_pool(&temp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();

        Self {
            store: Arc::new(SqliteContentStore::new(pool)),
            live: Arc::new(RecordingBroadcast::default()),
            _temp: temp,
        }
    }

    pub fn live(&self) -> DynLiveBroadcast {
        self.live.clone()
    }

    pub async fn user(&self, handle: &str) -> User {
        self.store
            .insert_user(&NewUser {
                handle: handle.to_string(),
                name: handle.to_uppercase(),
                display_name: None,
                avatar_url: None,
                provider: "test".to_string(),
                provider_account_id: format!("acct-{}", handle),
            })
            .await
            .unwrap()
    }

    pub async fn post_at(
        &self,
        author: &UserId,
        kind: PostKind,
        text: &str,
        at: DateTime<Utc>,
    ) -> Post {
        let post = Post {
            id: PostId::generate(),
            author_id: author.clone(),
            kind,
            text: text.to_string(),
            urls: vec![],
            video_urls: vec![],
            images: vec![],
            hashtags: vec![],
            mentions: vec![],
            likes_count: 0,
            replies_count: 0,
            reposts_count: 0,
            created_at: at,
            updated_at: at,
        };
        self.store.insert_post(&post).await.unwrap();
        post
    }

    pub async fn original(&self, author: &UserId, text: &str) -> Post {
        self.post_at(author, PostKind::Original, text, db::now()).await
    }

    pub async fn reload(&self, id: &PostId) -> Post {
        self.store.find_post(id).await.unwrap().unwrap()
    }

    pub async fn reload_user(&self, id: &UserId) -> User {
        self.store.find_user(id).await.unwrap().unwrap()
    }
}

pub fn seconds_after(base: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    base + Duration::seconds(secs)
}

#[derive(Default)]
pub struct RecordingBroadcast {
    events: Mutex<Vec<LiveEvent>>,
}

impl RecordingBroadcast {
    pub fn events(&self) -> Vec<LiveEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn on_channel(&self, channel: &str) -> Vec<LiveEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.channel == channel)
            .collect()
    }
}

#[async_trait]
impl LiveBroadcast for RecordingBroadcast {
    async fn publish(&self, channel: &str, event: &str, payload: Value) -> Result<(), LiveError> {
        self.events.lock().unwrap().push(LiveEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Broadcast transport that is always down.
pub struct FailingBroadcast;

#[async_trait]
impl LiveBroadcast for FailingBroadcast {
    async fn publish(&self, _: &str, _: &str, _: Value) -> Result<(), LiveError> {
        Err(LiveError::Publish("transport down".into()))
    }
}
