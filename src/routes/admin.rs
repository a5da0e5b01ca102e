use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::admin::{
        ActionResponse, ImageUploadResponse, ResetSessionRequest, StartGameRequest,
        UpsertQuestionsRequest,
    },
    error::AppError,
    services::{game_service, media_service},
    state::SharedState,
};

/// Header carrying the shared admin credential.
const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Admin-only endpoints driving the game; every route is gated by the
/// shared-key middleware before any engine code runs.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/questions", post(upsert_questions))
        .route("/admin/start", post(start_game))
        .route("/admin/reset", post(reset_session))
        .route("/admin/verify", get(verify_admin))
        .route("/admin/question-image", post(upload_question_image))
        .route_layer(middleware::from_fn_with_state(state, require_admin_key))
}

#[utoipa::path(
    post,
    path = "/api/admin/questions",
    tag = "admin",
    params(("X-Admin-Key" = String, Header, description = "Shared admin credential")),
    request_body = UpsertQuestionsRequest,
    responses((status = 200, description = "Question set replaced", body = ActionResponse))
)]
/// Replace the session's question set and bonus question wholesale.
pub async fn upsert_questions(
    State(state): State<SharedState>,
    Json(payload): Json<UpsertQuestionsRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    let UpsertQuestionsRequest {
        session_id,
        questions,
        bonus_question,
    } = payload;

    game_service::set_questions(
        &state,
        &session_id,
        questions.into_iter().map(Into::into).collect(),
        bonus_question.into(),
    )
    .await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/api/admin/start",
    tag = "admin",
    params(("X-Admin-Key" = String, Header, description = "Shared admin credential")),
    request_body = StartGameRequest,
    responses(
        (status = 200, description = "Game started; first question scheduled", body = ActionResponse),
        (status = 409, description = "Not enough players or no questions configured")
    )
)]
/// Start a fresh game on the session and schedule the first question.
pub async fn start_game(
    State(state): State<SharedState>,
    Json(payload): Json<StartGameRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    game_service::start(&state, &payload.session_id).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/api/admin/reset",
    tag = "admin",
    params(("X-Admin-Key" = String, Header, description = "Shared admin credential")),
    request_body = ResetSessionRequest,
    responses((status = 200, description = "Session back to an empty lobby", body = ActionResponse))
)]
/// Reset the session to an empty lobby and clear its event log.
pub async fn reset_session(
    State(state): State<SharedState>,
    Json(payload): Json<ResetSessionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    payload.validate()?;
    game_service::reset(&state, &payload.session_id).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    get,
    path = "/api/admin/verify",
    tag = "admin",
    params(("X-Admin-Key" = String, Header, description = "Shared admin credential")),
    responses(
        (status = 200, description = "Credential accepted", body = ActionResponse),
        (status = 401, description = "Credential missing or wrong")
    )
)]
/// No-op behind the admin gate; lets admin UIs check their credential.
pub async fn verify_admin() -> Json<ActionResponse> {
    Json(ActionResponse::ok())
}

#[utoipa::path(
    post,
    path = "/api/admin/question-image",
    tag = "admin",
    params(("X-Admin-Key" = String, Header, description = "Shared admin credential")),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = ImageUploadResponse),
        (status = 503, description = "Image storage is not configured")
    )
)]
/// Store a question image (`session_id`, `question_id`, and `file` fields)
/// and return the URL to embed in the question definition.
pub async fn upload_question_image(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, AppError> {
    let mut session_id = None;
    let mut question_id = None;
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("session_id") => {
                session_id = Some(read_text_field(field).await?);
            }
            Some("question_id") => {
                question_id = Some(read_text_field(field).await?);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(format!("unreadable file field: {err}")))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let session_id =
        session_id.ok_or_else(|| AppError::BadRequest("missing `session_id` field".into()))?;
    let question_id =
        question_id.ok_or_else(|| AppError::BadRequest("missing `question_id` field".into()))?;
    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("missing `file` field".into()))?;

    let url = media_service::upload_question_image(
        &state,
        &session_id,
        &question_id,
        &filename,
        bytes,
        content_type.as_deref(),
    )
    .await?;
    Ok(Json(ImageUploadResponse { url }))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|err| AppError::BadRequest(format!("unreadable form field: {err}")))
}

async fn require_admin_key(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing admin key header `X-Admin-Key`".into()))?;

    if provided != state.config().admin_key() {
        return Err(AppError::Unauthorized("invalid admin key".into()));
    }

    Ok(next.run(req).await)
}
