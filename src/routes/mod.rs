pub mod auth;
pub mod drafts;
pub mod feed;
pub mod live;
pub mod media;
pub mod notifications;
pub mod posts;
pub mod users;

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::Json;
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The full application: JSON API, live events and uploaded media.
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.config.uploads_path());
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(posts::router())
        .merge(feed::router())
        .merge(notifications::router())
        .merge(drafts::router())
        .merge(media::router(state.config.storage.max_upload_bytes))
        .merge(live::router())
        .nest_service(crate::media::MEDIA_PREFIX, uploads)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Wraps a serializable body in the `{ "success": true, ... }` envelope.
/// Struct fields are merged into the envelope.
pub(crate) fn success(body: impl Serialize) -> AppResult<Json<Value>> {
    let value = serde_json::to_value(body)
        .map_err(|e| AppError::Internal(format!("Failed to encode response: {}", e)))?;
    let mut envelope = match value {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".into(), other);
            map
        }
    };
    envelope.insert("success".into(), Value::Bool(true));
    Ok(Json(Value::Object(envelope)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn test_router(dir: &tempfile::TempDir) -> Router {
        test_router_with(dir, Config::default())
    }

    fn test_router_with(dir: &tempfile::TempDir, mut config: Config) -> Router {
        config.database.path = Some(dir.path().join("test.db"));
        config.storage.path = Some(dir.path().join("uploads"));
        let pool = crate::db::create_pool(config.db_path()).unwrap();
        crate::db::run_migrations(&pool).unwrap();
        build_router(AppState::new(pool, config))
    }

    #[tokio::test]
    async fn api_requires_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(&dir)
            .oneshot(Request::get("/api/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn unknown_bearer_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_router(&dir)
            .oneshot(
                Request::get("/api/users/me")
                    .header(header::AUTHORIZATION, "Bearer not-a-session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn signin_request(bridge_key: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::post("/api/auth/signin")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = bridge_key {
            builder = builder.header(crate::extractors::BRIDGE_KEY_HEADER, key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    const SIGNIN_BODY: &str = r#"{"provider":"github","providerAccountId":"1"}"#;

    #[tokio::test]
    async fn bridge_calls_refused_without_configured_key() {
        let dir = tempfile::tempdir().unwrap();
        for key in [None, Some(""), Some("anything")] {
            let response = test_router(&dir)
                .oneshot(signin_request(key, SIGNIN_BODY))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {:?}", key);
        }
    }

    #[tokio::test]
    async fn malformed_json_uses_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.auth.bridge_key = Some("bridge-secret".into());
        let router = test_router_with(&dir, config);

        let response = router
            .clone()
            .oneshot(signin_request(Some("bridge-secret"), "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

        let response = router
            .oneshot(signin_request(Some("bridge-secret"), SIGNIN_BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn success_merges_object_fields() {
        let Json(body) = success(json!({ "likesCount": 2 })).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["likesCount"], 2);
    }

    #[test]
    fn success_with_unit_is_bare_envelope() {
        let Json(body) = success(()).unwrap();
        assert_eq!(body, json!({ "success": true }));
    }
}
