use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{PlayerEntity, SessionEntity, SessionPhase},
    dto::{
        format_system_time,
        validation::{validate_session_id, validate_username},
    },
};

/// Payload used to create a session or fetch it if the id already exists.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Identifier shared out-of-band with the players.
    #[validate(custom(function = validate_session_id))]
    pub session_id: String,
}

/// Payload used to join a session under a display name.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    #[validate(custom(function = validate_session_id))]
    pub session_id: String,
    #[validate(custom(function = validate_username))]
    pub username: String,
}

/// Payload recording one player's answer to the active question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    #[validate(custom(function = validate_session_id))]
    pub session_id: String,
    #[validate(length(min = 1))]
    pub player_id: String,
    #[validate(length(min = 1))]
    pub question_id: String,
    /// Index of the picked option.
    pub option_index: usize,
}

/// Public projection of a roster entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerDto {
    pub id: String,
    pub username: String,
    pub score: i32,
    pub is_tied_finalist: bool,
}

impl From<PlayerEntity> for PlayerDto {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            score: value.score,
            is_tied_finalist: value.is_tied_finalist,
        }
    }
}

/// Public projection of a session. Question bodies are deliberately absent;
/// they reach clients through `question` events only.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub id: String,
    /// Current phase, serialized under the historical `state` wire name.
    pub state: SessionPhase,
    pub players: Vec<PlayerDto>,
    pub current_question_index: i64,
    pub question_deadline_ts: Option<f64>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<SessionEntity> for SessionView {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            state: value.phase,
            players: value.players.into_iter().map(Into::into).collect(),
            current_question_index: value.current_question_index,
            question_deadline_ts: value.question_deadline_ts,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Response returned once a player has joined.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub player: PlayerDto,
}

/// Response for an answer submission: `accepted` is true only when the
/// answer was recorded *and* correct. Points stay hidden until the reveal.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    pub accepted: bool,
}
