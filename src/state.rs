use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::live::{DynLiveBroadcast, LiveHub};
use crate::media::{DynMediaStore, LocalMediaStore};
use crate::social::drafts::Drafts;
use crate::social::profile::Profiles;
use crate::social::{DynContentStore, FeedAssembler, SocialActions, SqliteContentStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub store: DynContentStore,
    pub live: Arc<LiveHub>,
    pub media: DynMediaStore,
}

impl AppState {
    /// Wires the SQLite store, the in-process live hub and local media
    /// storage around an existing pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        let store: DynContentStore = Arc::new(SqliteContentStore::new(db.clone()));
        let live = Arc::new(LiveHub::new(config.live.channel_capacity));
        let media: DynMediaStore = Arc::new(LocalMediaStore::new(
            config.uploads_path().to_path_buf(),
            config.storage.max_upload_bytes,
        ));
        Self {
            db,
            config,
            store,
            live,
            media,
        }
    }

    pub fn broadcast(&self) -> DynLiveBroadcast {
        self.live.clone()
    }

    pub fn actions(&self) -> SocialActions {
        SocialActions::new(self.store.clone(), self.broadcast())
    }

    pub fn feed(&self) -> FeedAssembler {
        FeedAssembler::new(self.store.clone())
    }

    pub fn profiles(&self) -> Profiles {
        Profiles::new(self.store.clone())
    }

    pub fn drafts(&self) -> Drafts {
        Drafts::new(self.store.clone())
    }
}
