use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::events::EventCursorQuery,
    error::AppError,
    services::sse_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/api/session/{id}/stream",
    tag = "events",
    params(
        ("id" = String, Path, description = "Session identifier"),
        EventCursorQuery
    ),
    responses((status = 200, description = "Event stream: stored backlog after the cursor, then live events", content_type = "text/event-stream", body = String))
)]
/// Stream a session's events over SSE, resuming after the client's cursor.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(cursor): Query<EventCursorQuery>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let after = cursor.after.unwrap_or(0);
    let (backlog, receiver) = sse_service::subscribe(&state, &id, after).await?;
    info!(session_id = %id, after, "new SSE connection");
    Ok(sse_service::to_sse_stream(id, after, backlog, receiver))
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/session/{id}/stream", get(session_stream))
}
