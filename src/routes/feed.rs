use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppResult;
use crate::extractors::{ApiQuery, CurrentUser};
use crate::routes::success;
use crate::social::{HomeTab, Page};
use crate::state::AppState;

/// `?before=<cursor>&limit=<n>` shared by every paged feed. The cursor is
/// the `nextCursor` of the previous page.
#[derive(Deserialize)]
pub struct PageQuery {
    pub before: Option<String>,
    pub limit: Option<usize>,
}

impl PageQuery {
    pub fn page(&self) -> AppResult<Page> {
        Page::parse(self.before.as_deref(), self.limit)
    }
}

#[derive(Deserialize)]
struct HomeQuery {
    #[serde(default)]
    tab: HomeTab,
    before: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/feed", get(home))
        .route("/api/bookmarks", get(bookmarks))
        .route("/api/search", get(search))
}

async fn home(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<HomeQuery>,
) -> AppResult<Json<Value>> {
    let page = Page::parse(query.before.as_deref(), query.limit)?;
    success(state.feed().home(&user.id, query.tab, page).await?)
}

async fn bookmarks(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Value>> {
    success(state.feed().bookmarks(&user.id, query.page()?).await?)
}

async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<Value>> {
    success(state.feed().search(&user.id, &query.q).await?)
}
