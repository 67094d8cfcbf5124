use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::success;
use crate::social::domain::NotificationId;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/mark-read", post(mark_all_read))
        .route("/api/notifications/{id}/mark-read", post(mark_read))
}

async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Value>> {
    let actions = state.actions();
    let notifications = actions.notifier().list(&user.id).await?;
    success(json!({ "notifications": notifications }))
}

async fn unread_count(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Value>> {
    let actions = state.actions();
    let count = actions.notifier().unread_count(&user.id).await?;
    success(json!({ "count": count }))
}

async fn mark_all_read(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Value>> {
    let actions = state.actions();
    let updated = actions.notifier().mark_all_read(&user.id).await?;
    success(json!({ "updated": updated }))
}

async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = NotificationId::parse(&id)?;
    let actions = state.actions();
    actions.notifier().mark_read(&id, &user.id).await?;
    success(())
}
