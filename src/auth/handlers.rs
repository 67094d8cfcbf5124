use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::auth::session;
use crate::db::models::{NewUser, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, BridgeCaller};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub registration_key: Option<String>,
    pub provider: String,
    pub provider_account_id: String,
    pub handle: String,
    pub name: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub provider: String,
    pub provider_account_id: String,
}

/// Opens a session for `user` and answers with the cookie and token.
async fn session_response(state: &AppState, user: &User, status: StatusCode) -> AppResult<Response> {
    let token = session::create_session(&state.db, &user.id, state.config.auth.session_hours)?;
    let profile = state.profiles().me(&user.id).await?;
    let cookie = session::session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "success": true,
            "token": token,
            "user": profile,
        })),
    )
        .into_response())
}

/// POST /api/auth/register: bind a handle to an external identity
pub async fn register(
    State(state): State<AppState>,
    _bridge: BridgeCaller,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    if let Some(expected) = state.config.auth.registration_key.as_deref() {
        if req.registration_key.as_deref() != Some(expected) {
            return Err(AppError::Forbidden("Invalid registration key".into()));
        }
    }
    if req.provider.trim().is_empty() || req.provider_account_id.trim().is_empty() {
        return Err(AppError::Validation("Identity provider account is required".into()));
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }

    let user = state
        .profiles()
        .register(NewUser {
            handle: req.handle.trim().to_string(),
            name: name.to_string(),
            display_name: req.display_name.filter(|d| !d.trim().is_empty()),
            avatar_url: req.avatar_url.filter(|u| !u.trim().is_empty()),
            provider: req.provider,
            provider_account_id: req.provider_account_id,
        })
        .await?;

    session_response(&state, &user, StatusCode::CREATED).await
}

/// POST /api/auth/signin: open a session for an already bound identity
pub async fn signin(
    State(state): State<AppState>,
    _bridge: BridgeCaller,
    ApiJson(req): ApiJson<SigninRequest>,
) -> AppResult<Response> {
    let user = state
        .store
        .find_user_by_identity(&req.provider, &req.provider_account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not registered".into()))?;

    tracing::info!(user = %user.id, "Signed in");
    session_response(&state, &user, StatusCode::OK).await
}

/// POST /api/auth/signout: delete the session and clear the cookie
pub async fn signout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session::request_token(&headers, &state.config.auth.cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            session::clear_session_cookie(&state.config.auth.cookie_name),
        )],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response())
}
