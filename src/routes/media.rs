use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::success;
use crate::state::AppState;

/// Room for multipart framing around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/api/upload",
        post(upload).layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD)),
    )
}

/// POST /api/upload: first `file` field of a multipart form
async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?;

        let url = state.media.put(bytes.to_vec(), &content_type).await?;
        tracing::info!(user = %user.id, url = %url, "Media uploaded");
        return Ok((StatusCode::CREATED, success(json!({ "url": url }))?));
    }

    Err(AppError::Validation("No file provided".into()))
}
