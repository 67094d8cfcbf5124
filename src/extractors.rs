use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::auth::session;
use crate::error::AppError;
use crate::social::domain::UserId;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub handle: String,
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session::request_token(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        match session::session_user(&state.db, token)? {
            Some((id, handle)) => Ok(CurrentUser { id, handle }),
            None => Err(AppError::Unauthorized),
        }
    }
}

/// Requests from the identity bridge carry a shared key. With no key
/// configured every bridge call is refused.
pub struct BridgeCaller;

pub const BRIDGE_KEY_HEADER: &str = "x-identity-bridge-key";

impl FromRequestParts<AppState> for BridgeCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.auth.bridge_key.as_deref() else {
            tracing::warn!("Rejected identity bridge call: no auth.bridge_key configured");
            return Err(AppError::Unauthorized);
        };
        let presented = parts
            .headers
            .get(BRIDGE_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented == Some(expected) {
            Ok(BridgeCaller)
        } else {
            tracing::warn!("Rejected identity bridge call with missing or wrong key");
            Err(AppError::Unauthorized)
        }
    }
}

/// JSON body whose rejections use the API error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}

/// Query string whose rejections use the API error envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}
