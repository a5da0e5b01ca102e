use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Externally visible phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Players are gathering; questions can be configured.
    Lobby,
    /// A question window is open and answers are being collected.
    Playing,
    /// The correct option and per-question awards are being shown.
    Reveal,
    /// The sorted leaderboard is displayed between questions.
    Scoreboard,
    /// Tied finalists are answering the bonus question.
    Tiebreak,
    /// The game is over; the final leaderboard has been published.
    Finished,
}

impl SessionPhase {
    /// Whether answer submissions are currently admissible.
    pub fn accepts_answers(self) -> bool {
        matches!(self, SessionPhase::Playing | SessionPhase::Tiebreak)
    }
}

/// Participant in a session, identified by a slug derived from the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerEntity {
    /// Stable identifier within the session (lowercase, hyphenated).
    pub id: String,
    /// Display name as entered at join time.
    pub username: String,
    /// Cumulative score for the current game.
    pub score: i32,
    /// True while the player is competing in the tiebreak round.
    pub is_tied_finalist: bool,
}

impl PlayerEntity {
    /// Fresh player with a zeroed score.
    pub fn new(id: String, username: String) -> Self {
        Self {
            id,
            username,
            score: 0,
            is_tied_finalist: false,
        }
    }
}

/// Multiple-choice question, immutable once pushed by the admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuestionEntity {
    /// Identifier supplied by the admin, unique within the question set.
    pub id: String,
    /// Question text shown to players.
    pub text: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    /// Optional illustration attached through the media store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Aggregate session document, the unit of persistence and locking.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntity {
    /// Stable identifier shared by all participants.
    pub id: String,
    /// Current phase; transitions are driven by the engine and scheduler.
    pub phase: SessionPhase,
    /// Roster in join order.
    pub players: Vec<PlayerEntity>,
    /// Regular question sequence for the current run.
    pub questions: Vec<QuestionEntity>,
    /// Bonus question reserved for the tiebreak round.
    pub bonus_question: Option<QuestionEntity>,
    /// Index into `questions` while playing; -1 in the lobby.
    pub current_question_index: i64,
    /// Submission deadline for the open question window, if any.
    pub question_deadline_ts: Option<f64>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time this document was persisted.
    pub updated_at: SystemTime,
}

impl SessionEntity {
    /// Fresh lobby session under the given id.
    pub fn new(id: String) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            phase: SessionPhase::Lobby,
            players: Vec::new(),
            questions: Vec::new(),
            bonus_question: None,
            current_question_index: -1,
            question_deadline_ts: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Question currently open for answers: the bonus question during the
    /// tiebreak, otherwise the regular question at the current index.
    pub fn active_question(&self) -> Option<&QuestionEntity> {
        match self.phase {
            SessionPhase::Tiebreak => self.bonus_question.as_ref(),
            _ => usize::try_from(self.current_question_index)
                .ok()
                .and_then(|index| self.questions.get(index)),
        }
    }

    /// Mutable handle on a roster entry by player id.
    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut PlayerEntity> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// Whether the given player is marked as a tiebreak finalist.
    pub fn is_finalist(&self, player_id: &str) -> bool {
        self.players
            .iter()
            .any(|p| p.id == player_id && p.is_tied_finalist)
    }
}

/// Append-only fact recording one player's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntity {
    /// Session the answer belongs to.
    pub session_id: String,
    /// Player who answered.
    pub player_id: String,
    /// Question being answered.
    pub question_id: String,
    /// Option the player picked.
    pub option_index: usize,
    /// Whether the pick matched the question's correct index.
    pub is_correct: bool,
    /// Submission time (epoch seconds); drives the speed bonus ordering.
    pub timestamp: f64,
}

/// Immutable, sequence-numbered record in a session's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntity {
    /// Session the event belongs to.
    pub session_id: String,
    /// Strictly increasing per-session sequence number, starting at 1.
    pub seq: i64,
    /// Append time (epoch seconds).
    pub timestamp: f64,
    /// Typed payload clients replay to rebuild their view.
    pub payload: EventPayload,
}

/// Payload carried by an event-log record. The serialized `type` tag is the
/// wire name clients and the SSE relay dispatch on.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full roster snapshot after any roster or score change.
    PlayersUpdate {
        /// Roster in join order, scores included.
        players: Vec<PlayerEntity>,
    },
    /// A question window opened.
    Question {
        /// True for the tiebreak bonus question.
        is_bonus: bool,
        /// The question body as configured by the admin.
        question: QuestionEntity,
        /// Index of the question within the regular sequence.
        question_index: i64,
        /// Size of the regular question sequence.
        total_questions: usize,
        /// Submission deadline (epoch seconds).
        deadline_ts: f64,
    },
    /// A question window closed and was scored.
    Reveal {
        /// Question that was just scored.
        question_id: String,
        /// Correct option index, now public.
        correct_index: usize,
        /// Points awarded this question, keyed by player id.
        awards: HashMap<String, i32>,
    },
    /// Leaderboard snapshot shown between questions.
    Scoreboard {
        /// How long the scoreboard stays up, in seconds.
        duration: u64,
        /// Players sorted by (score desc, username asc case-insensitive).
        leaderboard: Vec<PlayerEntity>,
    },
    /// Tied leaders enter the bonus round.
    TiebreakStart {
        /// Ids of the players competing in the tiebreak.
        finalist_ids: Vec<String>,
    },
    /// The game ended; final standings follow.
    GameOver {
        /// Final sorted leaderboard.
        leaderboard: Vec<PlayerEntity>,
    },
    /// The session was reset; subscribers must discard derived state.
    SessionReset,
}

impl EventPayload {
    /// Wire name of the payload kind, also used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::PlayersUpdate { .. } => "players_update",
            EventPayload::Question { .. } => "question",
            EventPayload::Reveal { .. } => "reveal",
            EventPayload::Scoreboard { .. } => "scoreboard",
            EventPayload::TiebreakStart { .. } => "tiebreak_start",
            EventPayload::GameOver { .. } => "game_over",
            EventPayload::SessionReset => "session_reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_matches_serialized_tag() {
        let payload = EventPayload::TiebreakStart {
            finalist_ids: vec!["ana".into()],
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], payload.kind());
        assert_eq!(value["finalist_ids"][0], "ana");
    }

    #[test]
    fn session_reset_serializes_with_only_the_tag() {
        let value = serde_json::to_value(EventPayload::SessionReset).unwrap();
        assert_eq!(value, serde_json::json!({"type": "session_reset"}));
    }

    #[test]
    fn active_question_tracks_phase_and_index() {
        let mut session = SessionEntity::new("room-1".into());
        session.questions = vec![QuestionEntity {
            id: "q1".into(),
            text: "2+2?".into(),
            options: vec!["3".into(), "4".into()],
            correct_index: 1,
            image_url: None,
        }];
        session.bonus_question = Some(QuestionEntity {
            id: "qb".into(),
            text: "capital of France?".into(),
            options: vec!["Paris".into(), "Lyon".into()],
            correct_index: 0,
            image_url: None,
        });

        // Lobby: index is -1, no active question.
        assert!(session.active_question().is_none());

        session.phase = SessionPhase::Playing;
        session.current_question_index = 0;
        assert_eq!(session.active_question().map(|q| q.id.as_str()), Some("q1"));

        session.phase = SessionPhase::Tiebreak;
        assert_eq!(session.active_question().map(|q| q.id.as_str()), Some("qb"));
    }
}
