//! Read-only projections served to players and spectators.

use crate::{
    dto::events::EventsPage,
    dto::session::SessionView,
    error::ServiceError,
    services::{event_log, game_service},
    state::SharedState,
};

/// Upper bound a polling client may request in one page.
const MAX_LIST_LIMIT: i64 = 1000;

/// Create the session if the id is new, then return its public view.
pub async fn create_or_get_session(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionView, ServiceError> {
    let session = game_service::create_or_get(state, session_id).await?;
    Ok(session.into())
}

/// Public view of an existing session.
pub async fn session_view(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionView, ServiceError> {
    let session = game_service::get_session(state, session_id).await?;
    Ok(session.into())
}

/// Page of events after the client's cursor, newest last.
pub async fn events_page(
    state: &SharedState,
    session_id: &str,
    after: Option<i64>,
    limit: Option<i64>,
) -> Result<EventsPage, ServiceError> {
    let cursor = after.unwrap_or(0);
    let limit = limit
        .unwrap_or(event_log::DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let events = event_log::list(state, session_id, cursor, limit).await?;
    let latest_seq = events.last().map(|event| event.seq).or(after);

    Ok(EventsPage {
        events: events.into_iter().map(Into::into).collect(),
        latest_seq,
    })
}
