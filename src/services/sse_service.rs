//! SSE stream assembly.
//!
//! A session stream first replays the stored backlog after the client's
//! cursor, then forwards the live relay. The hub subscription is taken
//! *before* the backlog is read so no event can fall between the two; any
//! overlap is deduplicated by sequence number instead.

use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::{
    dao::models::EventEntity,
    dto::{events::EventRecord, sse::ServerEvent},
    error::ServiceError,
    services::event_log,
    state::SharedState,
};

/// Cap on stored events replayed when a stream opens; older history is
/// available through the polling endpoint.
const REPLAY_LIMIT: i64 = 500;

/// Subscribe to a session's live relay and read the stored backlog after
/// `after`. Subscription happens first so nothing can fall in between.
pub async fn subscribe(
    state: &SharedState,
    session_id: &str,
    after: i64,
) -> Result<(Vec<EventEntity>, broadcast::Receiver<ServerEvent>), ServiceError> {
    let receiver = state.hubs().subscribe(session_id);
    let backlog = event_log::list(state, session_id, after, REPLAY_LIMIT).await?;
    Ok((backlog, receiver))
}

/// Assemble the SSE response: replayed backlog, then the live feed with
/// replay overlap dropped by sequence number.
pub fn to_sse_stream(
    session_id: String,
    after: i64,
    backlog: Vec<EventEntity>,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream! {
        let mut last_seq = after;
        for entity in backlog {
            last_seq = entity.seq;
            let record = EventRecord::from(entity.clone());
            match ServerEvent::json(entity.payload.kind(), entity.seq, &record) {
                Ok(event) => yield Ok(to_sse_event(event)),
                Err(err) => warn!(
                    session_id = %session_id,
                    seq = entity.seq,
                    error = %err,
                    "failed to serialize stored event for replay"
                ),
            }
        }

        loop {
            match receiver.recv().await {
                // A reset rewinds the sequence to 1; the marker must always
                // go through so subscribers know to discard derived state.
                Ok(event) if event.seq > last_seq || event.event == "session_reset" => {
                    last_seq = event.seq;
                    yield Ok(to_sse_event(event));
                }
                // Already covered by the replayed backlog.
                Ok(_) => continue,
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    // The polling endpoint is the catch-up path.
                    warn!(session_id = %session_id, skipped, "SSE subscriber lagged");
                    continue;
                }
            }
        }

        info!(session_id = %session_id, "SSE stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(event: ServerEvent) -> Event {
    Event::default()
        .event(event.event)
        .id(event.seq.to_string())
        .data(event.data)
}
