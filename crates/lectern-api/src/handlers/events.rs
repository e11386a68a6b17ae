//! Server-sent progress events.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::handlers::videos::parse_video_id;
use crate::metrics;
use crate::state::AppState;

/// Stream a video's pipeline events, one JSON object per `data:` line.
///
/// GET /videos/:video_id/events
///
/// Only events published after the subscription is registered are delivered.
/// The mailbox is deregistered when the client disconnects. The stream ends
/// when the server starts shutting down.
pub async fn subscribe_events(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let id = parse_video_id(video_id)?;
    if state.shutdown.is_triggered() {
        return Err(ApiError::unavailable("server is shutting down"));
    }
    let subscription = state.broker.subscribe(id.as_str());
    metrics::record_event_stream_opened();
    debug!(video_id = %id, "Event stream opened");

    let shutdown = state.shutdown.clone();
    let stream = subscription
        .map(|message| Ok(Event::default().data(&*message)))
        .take_until(async move { shutdown.wait().await });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.config.sse_keep_alive)))
}
