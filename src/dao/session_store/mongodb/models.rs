use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::dao::models::{PlayerEntity, QuestionEntity, SessionEntity, SessionPhase};

/// Session aggregate as stored in the `sessions` collection, keyed by the
/// client-visible session id. Answers and events are bson-friendly as-is and
/// are stored as their entity types directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    phase: SessionPhase,
    players: Vec<PlayerEntity>,
    questions: Vec<QuestionEntity>,
    bonus_question: Option<QuestionEntity>,
    current_question_index: i64,
    question_deadline_ts: Option<f64>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<SessionEntity> for SessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            phase: value.phase,
            players: value.players,
            questions: value.questions,
            bonus_question: value.bonus_question,
            current_question_index: value.current_question_index,
            question_deadline_ts: value.question_deadline_ts,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<SessionDocument> for SessionEntity {
    fn from(value: SessionDocument) -> Self {
        Self {
            id: value.id,
            phase: value.phase,
            players: value.players,
            questions: value.questions,
            bonus_question: value.bonus_question,
            current_question_index: value.current_question_index,
            question_deadline_ts: value.question_deadline_ts,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Per-session event counter advanced with an atomic `$inc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterDocument {
    #[serde(rename = "_id")]
    pub session_id: String,
    pub seq: i64,
}
