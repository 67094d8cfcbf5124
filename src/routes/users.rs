use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::models::ProfilePatch;
use crate::error::AppResult;
use crate::extractors::{ApiJson, ApiQuery, CurrentUser};
use crate::routes::feed::PageQuery;
use crate::routes::success;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdateRequest {
    display_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    banner_url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(me).patch(update_me))
        .route("/api/users/{handle}", get(profile))
        .route("/api/users/{handle}/posts", get(profile_posts))
        .route("/api/users/{handle}/likes", get(profile_likes))
        .route("/api/follow/{handle}", post(follow).delete(unfollow))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Value>> {
    let profile = state.profiles().me(&user.id).await?;
    success(json!({ "user": profile }))
}

async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<ProfileUpdateRequest>,
) -> AppResult<Json<Value>> {
    let patch = ProfilePatch {
        display_name: req.display_name,
        bio: req.bio,
        avatar_url: req.avatar_url,
        banner_url: req.banner_url,
    };
    let profile = state.profiles().update(&user.id, patch).await?;
    success(json!({ "user": profile }))
}

async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(handle): Path<String>,
) -> AppResult<Json<Value>> {
    let profile = state.profiles().view(&user.id, &handle).await?;
    success(json!({ "user": profile }))
}

async fn profile_posts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(handle): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Value>> {
    let feed = state
        .feed()
        .profile_posts(&user.id, &handle, query.page()?)
        .await?;
    success(feed)
}

async fn profile_likes(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(handle): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Value>> {
    let feed = state
        .feed()
        .profile_likes(&user.id, &handle, query.page()?)
        .await?;
    success(feed)
}

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(handle): Path<String>,
) -> AppResult<Json<Value>> {
    let followee = state.actions().follow(&user.id, &handle).await?;
    success(json!({ "following": true, "handle": followee.handle }))
}

async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(handle): Path<String>,
) -> AppResult<Json<Value>> {
    let followee = state.actions().unfollow(&user.id, &handle).await?;
    success(json!({ "following": false, "handle": followee.handle }))
}
