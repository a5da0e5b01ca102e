use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        events::{EventCursorQuery, EventsPage},
        session::{
            AnswerRequest, AnswerResponse, CreateSessionRequest, JoinRequest, JoinResponse,
            SessionView,
        },
    },
    error::AppError,
    services::{game_service, public_service},
    state::SharedState,
};

/// Player-facing routes: session bootstrap, joining, answering, event replay.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/session", post(create_or_get_session))
        .route("/session/{id}", get(get_session))
        .route("/session/{id}/events", get(list_events))
        .route("/join", post(join_session))
        .route("/answer", post(submit_answer))
}

#[utoipa::path(
    post,
    path = "/api/session",
    tag = "session",
    request_body = CreateSessionRequest,
    responses((status = 200, description = "Existing or freshly created session", body = SessionView))
)]
/// Create a session under the given id, or return it if it already exists.
pub async fn create_or_get_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    payload.validate()?;
    let view = public_service::create_or_get_session(&state, &payload.session_id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/api/session/{id}",
    tag = "session",
    params(("id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Public session projection", body = SessionView),
        (status = 404, description = "Unknown session id")
    )
)]
/// Public projection of a session: phase, roster, and question progress.
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(public_service::session_view(&state, &id).await?))
}

#[utoipa::path(
    post,
    path = "/api/join",
    tag = "session",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player added to the roster", body = JoinResponse),
        (status = 409, description = "Session roster is full")
    )
)]
/// Join a session under a display name, creating the session if needed.
pub async fn join_session(
    State(state): State<SharedState>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    payload.validate()?;
    let player = game_service::join(&state, &payload.session_id, &payload.username).await?;
    Ok(Json(JoinResponse {
        player: player.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/answer",
    tag = "session",
    request_body = AnswerRequest,
    responses((status = 200, description = "Whether the answer was accepted and correct", body = AnswerResponse))
)]
/// Submit an answer to the active question. Late, duplicate, or otherwise
/// inadmissible submissions come back as `accepted: false`, never an error.
pub async fn submit_answer(
    State(state): State<SharedState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    payload.validate()?;
    let accepted = game_service::submit_answer(
        &state,
        &payload.session_id,
        &payload.player_id,
        &payload.question_id,
        payload.option_index,
    )
    .await?;
    Ok(Json(AnswerResponse { accepted }))
}

#[utoipa::path(
    get,
    path = "/api/session/{id}/events",
    tag = "events",
    params(
        ("id" = String, Path, description = "Session identifier"),
        EventCursorQuery
    ),
    responses((status = 200, description = "Events after the cursor, ascending", body = EventsPage))
)]
/// Page through the session's event log; clients resume from `latest_seq`.
pub async fn list_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(cursor): Query<EventCursorQuery>,
) -> Result<Json<EventsPage>, AppError> {
    let page = public_service::events_page(&state, &id, cursor.after, cursor.limit).await?;
    Ok(Json(page))
}
