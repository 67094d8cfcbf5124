use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::error::{AppError, AppResult};
use crate::extractors::{ApiQuery, CurrentUser};
use crate::live;
use crate::social::domain::{PostId, UserId};
use crate::state::AppState;

#[derive(Deserialize)]
struct LiveQuery {
    channel: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/live", get(events))
}

/// Anyone signed in may watch a post; a user channel is private to its owner.
fn authorize_channel(user: &UserId, channel: &str) -> AppResult<String> {
    if let Some(raw) = channel.strip_prefix("post-") {
        return Ok(live::post_channel(&PostId::parse(raw)?));
    }
    if let Some(raw) = channel.strip_prefix("user-") {
        if raw == user.as_str() {
            return Ok(live::user_channel(user));
        }
        return Err(AppError::Forbidden(
            "Cannot subscribe to another user's channel".into(),
        ));
    }
    Err(AppError::Validation("Unknown channel".into()))
}

/// GET /api/live?channel=: server-sent events for one channel
async fn events(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<LiveQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let requested = query
        .channel
        .ok_or_else(|| AppError::Validation("Channel required".into()))?;
    let channel = authorize_channel(&user.id, requested.trim())?;
    tracing::debug!(user = %user.id, channel = %channel, "Live subscriber attached");

    let stream = BroadcastStream::new(state.live.subscribe()).filter_map(move |received| {
        match received {
            Ok(event) if event.channel == channel => Some(Ok(Event::default()
                .event(event.event)
                .data(event.payload.to_string()))),
            Ok(_) => None,
            Err(lagged) => {
                tracing::warn!(channel = %channel, "Live subscriber fell behind: {}", lagged);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_channel_is_owner_only() {
        let me = UserId::new("0190a4b2-0000-7000-8000-000000000001");
        let ok = authorize_channel(&me, "user-0190a4b2-0000-7000-8000-000000000001");
        assert_eq!(ok.unwrap(), "user-0190a4b2-0000-7000-8000-000000000001");

        let other = authorize_channel(&me, "user-0190a4b2-0000-7000-8000-000000000002");
        assert!(matches!(other, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn post_channel_requires_a_post_id() {
        let me = UserId::new("u");
        let ok = authorize_channel(&me, "post-0190a4b2-0000-7000-8000-00000000000a");
        assert_eq!(ok.unwrap(), "post-0190a4b2-0000-7000-8000-00000000000a");

        let bad = authorize_channel(&me, "post-not-a-uuid");
        assert!(matches!(bad, Err(AppError::Validation(_))));
        let unknown = authorize_channel(&me, "admin");
        assert!(matches!(unknown, Err(AppError::Validation(_))));
    }
}
