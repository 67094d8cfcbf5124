use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::media::MediaError;
use crate::social::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Store(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(serde_json::json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Store(other),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Io(e) => AppError::Internal(format!("Media write failed: {}", e)),
            other => AppError::Validation(other.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(
            response_status(AppError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            response_status(AppError::Forbidden("no".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            response_status(AppError::NotFound("gone".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            response_status(AppError::Conflict("twice".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            response_status(AppError::InvalidOperation("repost".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn media_rejections_are_validation_errors() {
        assert!(matches!(
            AppError::from(MediaError::UnsupportedType),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(MediaError::Io(std::io::Error::other("disk"))),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn taxonomy_messages_are_passed_through() {
        assert_eq!(
            AppError::Conflict("Already following".into()).to_string(),
            "Already following"
        );
    }
}
