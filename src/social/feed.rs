//! Feed assembly.
//!
//! Every context runs the same stateless pipeline: select candidates,
//! batch-hydrate authors and viewer state, dedup reposts, then build view
//! models in candidate order. Missing authors and origins degrade to
//! placeholders and never fail the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::social::domain::{PostId, ReactionType, UserId};
use crate::social::graph::SocialGraph;
use crate::social::reactions::ReactionLedger;
use crate::social::reposts::{self, RepostResolver, Resolution};
use crate::social::store::{Cursor, DynContentStore, PostQuery};
use crate::social::views::{AuthorSummary, EmbeddedPost, PostView};

pub const FEED_CAP: usize = 50;
pub const SEARCH_CAP: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeTab {
    #[default]
    All,
    Following,
}

/// Cursor page: entries strictly after `before`, at most `limit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub before: Option<Cursor>,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            before: None,
            limit: FEED_CAP,
        }
    }
}

impl Page {
    pub fn parse(before: Option<&str>, limit: Option<usize>) -> AppResult<Self> {
        let before = before
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                Cursor::parse(raw.trim())
                    .ok_or_else(|| AppError::Validation("Invalid cursor".into()))
            })
            .transpose()?;

        let limit = limit.unwrap_or(FEED_CAP);
        if !(1..=FEED_CAP).contains(&limit) {
            return Err(AppError::Validation(format!(
                "Limit must be between 1 and {}",
                FEED_CAP
            )));
        }

        Ok(Self { before, limit })
    }

    /// Cursor for the following page, present only when this page is full.
    /// `keys` are the (time, post) sort keys of the rows on this page.
    fn next_cursor(&self, keys: &[(DateTime<Utc>, PostId)]) -> Option<String> {
        if keys.len() < self.limit {
            return None;
        }
        keys.last()
            .map(|(at, post)| Cursor::new(*at, post.clone()).to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub posts: Vec<PostView>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Thread {
    pub post: PostView,
    pub replies: Vec<PostView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub users: Vec<AuthorSummary>,
    pub posts: Vec<PostView>,
}

/// Viewer state for a set of action targets.
struct ViewerState {
    reactions: HashMap<PostId, ReactionType>,
    bookmarked: HashSet<PostId>,
    reposted: HashSet<PostId>,
}

#[derive(Clone)]
pub struct FeedAssembler {
    store: DynContentStore,
    graph: SocialGraph,
    ledger: ReactionLedger,
    resolver: RepostResolver,
}

impl FeedAssembler {
    pub fn new(store: DynContentStore) -> Self {
        Self {
            graph: SocialGraph::new(store.clone()),
            ledger: ReactionLedger::new(store.clone()),
            resolver: RepostResolver::new(store.clone()),
            store,
        }
    }

    pub async fn home(&self, viewer: &UserId, tab: HomeTab, page: Page) -> AppResult<Feed> {
        let mut query = PostQuery::top_level();
        if tab == HomeTab::Following {
            query = query.by_authors(self.graph.following_authors(viewer).await?);
        }
        self.post_feed(viewer, query, page).await
    }

    pub async fn profile_posts(&self, viewer: &UserId, handle: &str, page: Page) -> AppResult<Feed> {
        let user = self.user_by_handle(handle).await?;
        let query = PostQuery::top_level().by_authors(vec![user.id]);
        self.post_feed(viewer, query, page).await
    }

    /// Posts the viewer reacted to, newest reaction first. Only the owner
    /// of the profile may see it.
    pub async fn profile_likes(&self, viewer: &UserId, handle: &str, page: Page) -> AppResult<Feed> {
        let user = self.user_by_handle(handle).await?;
        if &user.id != viewer {
            return Err(AppError::Forbidden(
                "Likes are only visible on your own profile".into(),
            ));
        }

        let reactions = self
            .store
            .list_reactions(viewer, page.before.as_ref(), page.limit)
            .await?;
        let keys: Vec<_> = reactions
            .iter()
            .map(|r| (r.created_at, r.post_id.clone()))
            .collect();
        let ids: Vec<_> = reactions.into_iter().map(|r| r.post_id).collect();

        let posts = self.posts_in_order(&ids).await?;
        Ok(Feed {
            posts: self.assemble(viewer, posts).await?,
            next_cursor: page.next_cursor(&keys),
        })
    }

    pub async fn bookmarks(&self, viewer: &UserId, page: Page) -> AppResult<Feed> {
        let bookmarks = self
            .store
            .list_bookmarks(viewer, page.before.as_ref(), page.limit)
            .await?;
        let keys: Vec<_> = bookmarks
            .iter()
            .map(|b| (b.created_at, b.post_id.clone()))
            .collect();
        let ids: Vec<_> = bookmarks.into_iter().map(|b| b.post_id).collect();

        let posts = self.posts_in_order(&ids).await?;
        Ok(Feed {
            posts: self.assemble(viewer, posts).await?,
            next_cursor: page.next_cursor(&keys),
        })
    }

    /// The post and its direct replies, newest reply first.
    pub async fn thread(&self, viewer: &UserId, id: &PostId) -> AppResult<Thread> {
        let post = self
            .store
            .find_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
        let replies = self
            .store
            .find_posts(&PostQuery::replies_to(id.clone()))
            .await?;

        let mut window = Vec::with_capacity(replies.len() + 1);
        window.push(post);
        window.extend(replies);

        let mut views = self.assemble(viewer, window).await?;
        let position = views
            .iter()
            .position(|v| &v.post.id == id)
            .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
        let post = views.remove(position);

        Ok(Thread {
            post,
            replies: views,
        })
    }

    pub async fn search(&self, viewer: &UserId, raw_query: &str) -> AppResult<SearchResults> {
        let needle = raw_query.trim();
        if needle.is_empty() {
            return Ok(SearchResults {
                users: Vec::new(),
                posts: Vec::new(),
            });
        }

        let users = self
            .store
            .search_users(needle, SEARCH_CAP)
            .await?
            .iter()
            .map(AuthorSummary::from)
            .collect();

        let candidates = self
            .store
            .find_posts(&PostQuery::top_level().containing(needle).limit(SEARCH_CAP))
            .await?;

        Ok(SearchResults {
            users,
            posts: self.assemble(viewer, candidates).await?,
        })
    }

    /// Hydrate, dedup and annotate `candidates` for `viewer`, keeping order.
    pub async fn assemble(&self, viewer: &UserId, candidates: Vec<Post>) -> AppResult<Vec<PostView>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let resolution = self.resolver.resolve(&candidates).await?;

        let mut targets: Vec<PostId> = Vec::new();
        for target in candidates.iter().map(Post::action_target) {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        let state = self.viewer_state(viewer, &targets).await?;

        Ok(reposts::dedup(candidates)
            .iter()
            .map(|post| build_view(post, viewer, &resolution, &state))
            .collect())
    }

    async fn viewer_state(&self, viewer: &UserId, targets: &[PostId]) -> AppResult<ViewerState> {
        let reactions = self.ledger.user_reaction_map(viewer, targets).await?;
        let bookmarked = self
            .store
            .bookmarked_among(viewer, targets)
            .await?
            .into_iter()
            .collect();
        let reposted = self
            .store
            .find_posts(&PostQuery::reposts_by(viewer.clone(), targets.to_vec()))
            .await?
            .into_iter()
            .filter_map(|p| p.kind.origin_id().cloned())
            .collect();

        Ok(ViewerState {
            reactions,
            bookmarked,
            reposted,
        })
    }

    async fn post_feed(&self, viewer: &UserId, query: PostQuery, page: Page) -> AppResult<Feed> {
        let query = query.before(page.before.clone()).limit(page.limit);
        let candidates = self.store.find_posts(&query).await?;
        let keys: Vec<_> = candidates
            .iter()
            .map(|p| (p.created_at, p.id.clone()))
            .collect();

        Ok(Feed {
            posts: self.assemble(viewer, candidates).await?,
            next_cursor: page.next_cursor(&keys),
        })
    }

    /// Fetch `ids` in one round trip and return them in `ids` order,
    /// skipping posts that no longer exist.
    async fn posts_in_order(&self, ids: &[PostId]) -> AppResult<Vec<Post>> {
        let mut by_id: HashMap<PostId, Post> = self
            .store
            .find_posts_by_ids(ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn user_by_handle(&self, handle: &str) -> AppResult<crate::db::models::User> {
        self.store
            .find_user_by_handle(handle)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }
}

fn build_view(
    post: &Post,
    viewer: &UserId,
    resolution: &Resolution,
    state: &ViewerState,
) -> PostView {
    let author = AuthorSummary::or_unknown(resolution.author(&post.author_id), &post.author_id);
    let repost_of = post
        .kind
        .origin_id()
        .and_then(|id| resolution.origin(id))
        .map(|origin| {
            let origin_author =
                AuthorSummary::or_unknown(resolution.author(&origin.author_id), &origin.author_id);
            EmbeddedPost::new(origin, origin_author)
        });

    let target = post.action_target();
    let reaction = state.reactions.get(target).copied();

    PostView {
        post: EmbeddedPost::new(post, author),
        is_repost: post.kind.is_repost(),
        repost_of,
        is_liked: reaction.is_some(),
        current_reaction: reaction,
        is_reposted: state.reposted.contains(target),
        is_bookmarked: state.bookmarked.contains(target),
        is_own: &post.author_id == viewer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::social::domain::PostKind;
    use crate::social::testing::{seconds_after, Fixture};

    fn repost_kind(origin: &Post) -> PostKind {
        PostKind::Repost {
            origin_id: origin.id.clone(),
        }
    }

    #[tokio::test]
    async fn home_all_lists_top_level_newest_first() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let t0 = db::now();

        let older = fx.post_at(&alice.id, PostKind::Original, "older", t0).await;
        let newer = fx
            .post_at(&alice.id, PostKind::Original, "newer", seconds_after(t0, 1))
            .await;
        fx.post_at(
            &alice.id,
            PostKind::Reply {
                parent_id: older.id.clone(),
            },
            "reply",
            seconds_after(t0, 2),
        )
        .await;

        let feed = feeds.home(&alice.id, HomeTab::All, Page::default()).await.unwrap();
        let ids: Vec<_> = feed.posts.iter().map(|v| v.post.id.clone()).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert!(feed.next_cursor.is_none());
    }

    #[tokio::test]
    async fn in_window_repost_shows_once() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let u1 = fx.user("alice").await;
        let u2 = fx.user("bob").await;
        let t0 = db::now();

        let p1 = fx.post_at(&u1.id, PostKind::Original, "p1 text", t0).await;
        let repost = fx
            .post_at(&u2.id, repost_kind(&p1), "p1 text", seconds_after(t0, 10))
            .await;

        let feed = feeds.home(&u1.id, HomeTab::All, Page::default()).await.unwrap();
        assert_eq!(feed.posts.len(), 1);
        let entry = &feed.posts[0];
        assert_eq!(entry.post.id, repost.id);
        assert!(entry.is_repost);
        let embedded = entry.repost_of.as_ref().unwrap();
        assert_eq!(embedded.id, p1.id);
        assert_eq!(embedded.author.handle, "alice");
    }

    #[tokio::test]
    async fn original_shown_when_repost_is_outside_window() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let u1 = fx.user("alice").await;
        let u2 = fx.user("bob").await;
        let t0 = db::now();

        let p1 = fx.post_at(&u1.id, PostKind::Original, "p1", t0).await;
        fx.post_at(&u2.id, repost_kind(&p1), "p1", seconds_after(t0, 10))
            .await;

        // Window that starts below the repost
        let page = Page {
            before: Some(Cursor::at(seconds_after(t0, 5))),
            limit: FEED_CAP,
        };
        let feed = feeds.home(&u1.id, HomeTab::All, page).await.unwrap();
        assert_eq!(feed.posts.len(), 1);
        assert_eq!(feed.posts[0].post.id, p1.id);
    }

    #[tokio::test]
    async fn following_tab_with_no_followees_is_self_only() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;

        let own = fx.original(&alice.id, "mine").await;
        fx.original(&bob.id, "not mine").await;

        let feed = feeds
            .home(&alice.id, HomeTab::Following, Page::default())
            .await
            .unwrap();
        assert_eq!(feed.posts.len(), 1);
        assert_eq!(feed.posts[0].post.id, own.id);
        assert!(feed.posts[0].is_own);
    }

    #[tokio::test]
    async fn following_tab_includes_followees() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let carol = fx.user("carol").await;
        SocialGraph::new(fx.store.clone())
            .follow(&alice.id, &bob.id)
            .await
            .unwrap();

        fx.original(&bob.id, "from bob").await;
        fx.original(&carol.id, "from carol").await;

        let feed = feeds
            .home(&alice.id, HomeTab::Following, Page::default())
            .await
            .unwrap();
        let authors: Vec<_> = feed.posts.iter().map(|v| v.post.author.handle.clone()).collect();
        assert_eq!(authors, vec!["bob"]);
    }

    #[tokio::test]
    async fn annotations_follow_action_target() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let carol = fx.user("carol").await;
        let t0 = db::now();

        let p1 = fx.post_at(&alice.id, PostKind::Original, "p1", t0).await;
        fx.post_at(&bob.id, repost_kind(&p1), "p1", seconds_after(t0, 1))
            .await;
        fx.post_at(&carol.id, repost_kind(&p1), "p1", seconds_after(t0, 2))
            .await;
        fx.store
            .write_reaction(&carol.id, &p1.id, ReactionType::Laugh)
            .await
            .unwrap();
        fx.store.insert_bookmark(&carol.id, &p1.id).await.unwrap();

        let feed = feeds.home(&carol.id, HomeTab::All, Page::default()).await.unwrap();
        // Both reposts shown, original hidden
        assert_eq!(feed.posts.len(), 2);
        for entry in &feed.posts {
            assert!(entry.is_liked);
            assert_eq!(entry.current_reaction, Some(ReactionType::Laugh));
            assert!(entry.is_bookmarked);
            assert!(entry.is_reposted);
        }
    }

    #[tokio::test]
    async fn missing_author_and_origin_degrade() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;

        let p1 = fx.original(&alice.id, "gone soon").await;
        let repost = fx
            .post_at(&bob.id, repost_kind(&p1), "gone soon", db::now())
            .await;
        fx.store.delete_post(&p1.id).await.unwrap();

        let feed = feeds.home(&bob.id, HomeTab::All, Page::default()).await.unwrap();
        assert_eq!(feed.posts.len(), 1);
        assert_eq!(feed.posts[0].post.id, repost.id);
        assert!(feed.posts[0].repost_of.is_none());

        // A post whose author row is gone
        let orphan = Post {
            author_id: UserId::new("ghost"),
            ..fx.reload(&repost.id).await
        };
        let views = feeds.assemble(&bob.id, vec![orphan]).await.unwrap();
        assert_eq!(views[0].post.author.handle, "unknown");
        assert_eq!(views[0].post.author.name, "Unknown");
    }

    #[tokio::test]
    async fn likes_tab_is_owner_only_and_ordered_by_reaction_time() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let t0 = db::now();

        let newer_post = fx
            .post_at(&bob.id, PostKind::Original, "newer", seconds_after(t0, 10))
            .await;
        let older_post = fx.post_at(&bob.id, PostKind::Original, "older", t0).await;

        // React to the newer post first, the older one last
        fx.store
            .write_reaction(&alice.id, &newer_post.id, ReactionType::Like)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        fx.store
            .write_reaction(&alice.id, &older_post.id, ReactionType::Love)
            .await
            .unwrap();

        let feed = feeds
            .profile_likes(&alice.id, "alice", Page::default())
            .await
            .unwrap();
        let ids: Vec<_> = feed.posts.iter().map(|v| v.post.id.clone()).collect();
        assert_eq!(ids, vec![older_post.id, newer_post.id]);

        let denied = feeds.profile_likes(&bob.id, "alice", Page::default()).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn thread_has_post_and_direct_replies_newest_first() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let t0 = db::now();

        let root = fx.post_at(&alice.id, PostKind::Original, "root", t0).await;
        let reply_kind = PostKind::Reply {
            parent_id: root.id.clone(),
        };
        let first = fx
            .post_at(&alice.id, reply_kind.clone(), "first", seconds_after(t0, 1))
            .await;
        let second = fx
            .post_at(&alice.id, reply_kind, "second", seconds_after(t0, 2))
            .await;
        fx.post_at(
            &alice.id,
            PostKind::Reply {
                parent_id: first.id.clone(),
            },
            "nested",
            seconds_after(t0, 3),
        )
        .await;

        let thread = feeds.thread(&alice.id, &root.id).await.unwrap();
        assert_eq!(thread.post.post.id, root.id);
        let ids: Vec<_> = thread.replies.iter().map(|v| v.post.id.clone()).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let missing = feeds.thread(&alice.id, &PostId::generate()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn search_caps_each_category() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let viewer = fx.user("viewer").await;
        for i in 0..7 {
            fx.user(&format!("rust_{}", i)).await;
            fx.original(&viewer.id, &format!("Learning RUST day {}", i)).await;
        }

        let results = feeds.search(&viewer.id, "rust").await.unwrap();
        assert_eq!(results.users.len(), SEARCH_CAP);
        assert_eq!(results.posts.len(), SEARCH_CAP);

        let empty = feeds.search(&viewer.id, "   ").await.unwrap();
        assert!(empty.users.is_empty() && empty.posts.is_empty());
    }

    #[tokio::test]
    async fn full_page_carries_next_cursor() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let t0 = db::now();
        for i in 0..3 {
            fx.post_at(&alice.id, PostKind::Original, "p", seconds_after(t0, i))
                .await;
        }

        let page = Page::parse(None, Some(2)).unwrap();
        let first = feeds.home(&alice.id, HomeTab::All, page).await.unwrap();
        assert_eq!(first.posts.len(), 2);
        let cursor = first.next_cursor.unwrap();

        let rest = feeds
            .home(
                &alice.id,
                HomeTab::All,
                Page::parse(Some(&cursor), Some(2)).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(rest.posts.len(), 1);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn posts_sharing_a_timestamp_are_not_skipped() {
        let fx = Fixture::new();
        let feeds = FeedAssembler::new(fx.store.clone());
        let alice = fx.user("alice").await;
        let at = db::now();
        for i in 0..5 {
            fx.post_at(&alice.id, PostKind::Original, &format!("p{}", i), at)
                .await;
        }

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = Page::parse(cursor.as_deref(), Some(2)).unwrap();
            let feed = feeds.home(&alice.id, HomeTab::All, page).await.unwrap();
            seen.extend(feed.posts.iter().map(|p| p.post.id.clone()));
            match feed.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 5);
        let distinct: HashSet<_> = seen.iter().collect();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn page_validation() {
        assert!(Page::parse(None, Some(0)).is_err());
        assert!(Page::parse(None, Some(51)).is_err());
        assert!(Page::parse(Some("yesterday"), None).is_err());
        assert!(Page::parse(Some("2025-01-01T00:00:00Z_bogus"), None).is_err());
        assert_eq!(Page::parse(None, None).unwrap().limit, FEED_CAP);
        assert!(Page::parse(Some("2025-01-01T00:00:00Z"), Some(10))
            .unwrap()
            .before
            .is_some());
    }
}
