use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::extractors::{ApiJson, CurrentUser};
use crate::routes::success;
use crate::social::domain::DraftId;
use crate::state::AppState;

#[derive(Deserialize)]
struct DraftRequest {
    #[serde(default)]
    text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me/drafts", get(list).post(save))
        .route("/api/me/drafts/{id}", delete(remove))
}

async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Value>> {
    let drafts = state.drafts().list(&user.id).await?;
    success(json!({ "drafts": drafts }))
}

async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<DraftRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let draft = state.drafts().save(&user.id, &req.text).await?;
    Ok((StatusCode::CREATED, success(json!({ "draft": draft }))?))
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = DraftId::parse(&id)?;
    state.drafts().delete(&user.id, &id).await?;
    success(())
}
