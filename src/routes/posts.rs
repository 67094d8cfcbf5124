use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::routes::success;
use crate::social::{Compose, PostId, ReactionChange, ReactionType};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposeRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    images: Vec<String>,
    parent_id: Option<String>,
}

impl ComposeRequest {
    fn compose(self) -> (Compose, Option<String>) {
        (
            Compose {
                text: self.text,
                images: self.images,
            },
            self.parent_id,
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionRequest {
    reaction_type: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", post(create_post))
        .route("/api/posts/{id}", get(thread).delete(delete_post))
        .route("/api/posts/{id}/like", post(like).delete(unlike))
        .route("/api/posts/{id}/reaction", post(react).delete(unreact))
        .route("/api/posts/{id}/reply", post(reply))
        .route("/api/posts/{id}/repost", post(repost).delete(unrepost))
        .route("/api/bookmarks/{id}", post(bookmark).delete(unbookmark))
}

/// Renders a freshly written post the way feeds show it.
async fn created(state: &AppState, user: &CurrentUser, post: Post) -> AppResult<(StatusCode, Json<Value>)> {
    let view = state
        .feed()
        .assemble(&user.id, vec![post])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Created post did not render".into()))?;
    Ok((StatusCode::CREATED, success(json!({ "post": view }))?))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<ComposeRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let (body, parent) = req.compose();
    let parent = parent
        .filter(|p| !p.trim().is_empty())
        .map(|p| PostId::parse(&p))
        .transpose()?;

    let post = state
        .actions()
        .create_post(&user.id, body, parent.as_ref())
        .await?;
    created(&state, &user, post).await
}

async fn reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ComposeRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let parent = PostId::parse(&id)?;
    let (body, _) = req.compose();
    let post = state.actions().reply(&user.id, &parent, body).await?;
    created(&state, &user, post).await
}

async fn thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    success(state.feed().thread(&user.id, &id).await?)
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    state.actions().delete_post(&user.id, &id).await?;
    success(())
}

async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    success(state.actions().like(&user.id, &id).await?)
}

async fn unlike(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    success(state.actions().unlike(&user.id, &id).await?)
}

async fn react(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReactionRequest>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    let kind: ReactionType = req.reaction_type.trim().parse()?;
    let (change, counters) = state.actions().react(&user.id, &id, kind).await?;

    let Json(mut body) = success(counters)?;
    body["reactionType"] = json!(kind);
    body["replaced"] = json!(change == ReactionChange::Replaced);
    Ok(Json(body))
}

async fn unreact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    success(state.actions().unreact(&user.id, &id).await?)
}

async fn repost(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    success(state.actions().repost(&user.id, &id).await?)
}

async fn unrepost(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    success(state.actions().unrepost(&user.id, &id).await?)
}

async fn bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    state.actions().bookmark(&user.id, &id).await?;
    success(json!({ "bookmarked": true }))
}

async fn unbookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = PostId::parse(&id)?;
    state.actions().unbookmark(&user.id, &id).await?;
    success(json!({ "bookmarked": false }))
}
