//! Timed phase scheduler.
//!
//! One independently progressing sequence per session drives the
//! question-window → reveal → scoreboard → next-question/finish cycle. The
//! two `sleep` calls below are the engine's only voluntary suspension
//! points; answer submissions are serviced concurrently during the window.
//!
//! Every spawned cycle carries the session's generation token (epoch). An
//! admin `start` or `reset` bumps the token, and the cycle re-validates it
//! after each suspension and before the lock-guarded tail, so a stranded
//! cycle abandons silently instead of appending stale events.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    clock,
    dao::{
        models::{EventPayload, QuestionEntity, SessionPhase},
        session_store::SessionStore,
    },
    error::ServiceError,
    services::{event_log, game_service, scoring},
    state::SharedState,
};

/// Open submission window per question.
pub const QUESTION_WINDOW: Duration = Duration::from_secs(30);
/// Pause on the scoreboard between questions.
pub const SCOREBOARD_PAUSE: Duration = Duration::from_secs(5);

/// Spawn one question cycle as an independent task; the caller returns
/// immediately. Cycle-to-cycle continuation re-enters through here as well.
pub fn spawn_question_cycle(state: SharedState, session_id: String, epoch: u64, is_bonus: bool) {
    tokio::spawn(async move {
        if let Err(err) = run_question_cycle(&state, &session_id, epoch, is_bonus).await {
            error!(session_id = %session_id, error = %err, "question cycle aborted");
        }
    });
}

async fn run_question_cycle(
    state: &SharedState,
    session_id: &str,
    epoch: u64,
    is_bonus: bool,
) -> Result<(), ServiceError> {
    if !state.epoch_matches(session_id, epoch) {
        return Ok(());
    }
    let Some(mut session) = game_service::load_session(state, session_id).await? else {
        return Ok(());
    };

    let active = if is_bonus {
        session.bonus_question.clone()
    } else {
        usize::try_from(session.current_question_index)
            .ok()
            .and_then(|index| session.questions.get(index).cloned())
    };
    let Some(question) = active else {
        warn!(session_id, is_bonus, "no question to schedule; dropping cycle");
        return Ok(());
    };

    let deadline = clock::now_ts() + QUESTION_WINDOW.as_secs_f64();
    session.question_deadline_ts = Some(deadline);
    session.phase = if is_bonus {
        SessionPhase::Tiebreak
    } else {
        SessionPhase::Playing
    };
    game_service::persist(state, &mut session).await?;

    event_log::append(
        state,
        session_id,
        EventPayload::Question {
            is_bonus,
            question: question.clone(),
            question_index: session.current_question_index,
            total_questions: session.questions.len(),
            deadline_ts: deadline,
        },
    )
    .await?;

    // Answers stream in while the window is open.
    sleep(QUESTION_WINDOW).await;
    if !state.epoch_matches(session_id, epoch) {
        return Ok(());
    }

    reveal_and_score(state, session_id, &question).await?;

    sleep(SCOREBOARD_PAUSE).await;
    if !state.epoch_matches(session_id, epoch) {
        return Ok(());
    }

    if is_bonus {
        // The bonus cycle ends the game unconditionally.
        return finish(state, session_id).await;
    }

    // Lock-guarded tail: the index bump and the tiebreak decision must not
    // interleave with a concurrent join/start/reset.
    let lock = state.session_lock(session_id);
    let _guard = lock.lock().await;
    if !state.epoch_matches(session_id, epoch) {
        return Ok(());
    }
    let Some(mut session) = game_service::load_session(state, session_id).await? else {
        return Ok(());
    };

    if session.current_question_index + 1 < session.questions.len() as i64 {
        session.current_question_index += 1;
        game_service::persist(state, &mut session).await?;
        spawn_question_cycle(state.clone(), session_id.to_owned(), epoch, false);
        Ok(())
    } else {
        resolve_tiebreak_or_finish(state, session_id, epoch).await
    }
}

/// Close the window: score the recorded answers, apply awards, publish the
/// reveal, then the scoreboard, then the refreshed roster.
async fn reveal_and_score(
    state: &SharedState,
    session_id: &str,
    question: &QuestionEntity,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let answers = store.answers_for_question(session_id, &question.id).await?;
    let awards = scoring::score_question(&answers);

    let Some(mut session) = game_service::load_session(state, session_id).await? else {
        return Ok(());
    };
    for (player_id, points) in &awards {
        if let Some(player) = session.player_mut(player_id) {
            player.score += points;
        }
    }
    session.phase = SessionPhase::Reveal;
    session.question_deadline_ts = None;
    game_service::persist(state, &mut session).await?;

    event_log::append(
        state,
        session_id,
        EventPayload::Reveal {
            question_id: question.id.clone(),
            correct_index: question.correct_index,
            awards,
        },
    )
    .await?;

    let leaderboard = scoring::sort_leaderboard(&session.players);
    session.phase = SessionPhase::Scoreboard;
    game_service::persist(state, &mut session).await?;
    event_log::append(
        state,
        session_id,
        EventPayload::Scoreboard {
            duration: SCOREBOARD_PAUSE.as_secs(),
            leaderboard,
        },
    )
    .await?;
    game_service::publish_players(state, session_id, &session.players).await?;
    Ok(())
}

/// All regular questions are exhausted: finish outright when the top score
/// is uniquely held, otherwise mark the tied leaders and run the bonus
/// question for them alone.
async fn resolve_tiebreak_or_finish(
    state: &SharedState,
    session_id: &str,
    epoch: u64,
) -> Result<(), ServiceError> {
    let Some(mut session) = game_service::load_session(state, session_id).await? else {
        return Ok(());
    };
    if session.players.is_empty() {
        return finish(state, session_id).await;
    }

    let ranked = scoring::sort_leaderboard(&session.players);
    let top_score = ranked[0].score;
    let finalists: Vec<String> = ranked
        .iter()
        .take_while(|player| player.score == top_score)
        .map(|player| player.id.clone())
        .collect();
    if finalists.len() <= 1 {
        return finish(state, session_id).await;
    }

    for player in &mut session.players {
        player.is_tied_finalist = finalists.contains(&player.id);
    }
    session.phase = SessionPhase::Tiebreak;
    game_service::persist(state, &mut session).await?;

    game_service::publish_players(state, session_id, &session.players).await?;
    event_log::append(
        state,
        session_id,
        EventPayload::TiebreakStart {
            finalist_ids: finalists,
        },
    )
    .await?;

    info!(session_id, "tiebreak started");
    spawn_question_cycle(state.clone(), session_id.to_owned(), epoch, true);
    Ok(())
}

/// Terminal transition: clear finalist markers and publish the final
/// standings. No further cycles are scheduled.
async fn finish(state: &SharedState, session_id: &str) -> Result<(), ServiceError> {
    let Some(mut session) = game_service::load_session(state, session_id).await? else {
        return Ok(());
    };
    session.phase = SessionPhase::Finished;
    for player in &mut session.players {
        player.is_tied_finalist = false;
    }
    game_service::persist(state, &mut session).await?;

    let leaderboard = scoring::sort_leaderboard(&session.players);
    game_service::publish_players(state, session_id, &session.players).await?;
    event_log::append(state, session_id, EventPayload::GameOver { leaderboard }).await?;

    info!(session_id, "game over");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{EventEntity, QuestionEntity},
            session_store::memory::MemorySessionStore,
        },
        services::game_service::{join, reset, set_questions, start, submit_answer},
        state::AppState,
    };

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(Arc::new(MemorySessionStore::new()))
            .await;
        state
    }

    fn question(id: &str, correct_index: usize) -> QuestionEntity {
        QuestionEntity {
            id: id.into(),
            text: format!("question {id}"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_index,
            image_url: None,
        }
    }

    async fn events(state: &SharedState, session_id: &str) -> Vec<EventEntity> {
        event_log::list(state, session_id, 0, 500).await.unwrap()
    }

    /// Let spawned cycles run up to their next timer without advancing time.
    async fn settle() {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for_question(state: &SharedState, session_id: &str, question_id: &str) {
        for _ in 0..64 {
            let open = events(state, session_id).await.iter().any(|e| {
                matches!(
                    &e.payload,
                    EventPayload::Question { question, .. } if question.id == question_id
                )
            });
            if open {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("question `{question_id}` never opened for session `{session_id}`");
    }

    #[tokio::test(start_paused = true)]
    async fn a_full_game_with_a_tie_runs_through_tiebreak_to_finished() {
        let state = test_state().await;
        for name in ["ana", "bob", "cyd"] {
            join(&state, "room", name).await.unwrap();
        }
        set_questions(
            &state,
            "room",
            vec![question("q1", 1), question("q2", 1)],
            question("qb", 0),
        )
        .await
        .unwrap();

        start(&state, "room").await.unwrap();
        wait_for_question(&state, "room", "q1").await;

        // q1: ana first (15), bob second (14), cyd wrong (0).
        assert!(submit_answer(&state, "room", "ana", "q1", 1).await.unwrap());
        assert!(submit_answer(&state, "room", "bob", "q1", 1).await.unwrap());
        assert!(!submit_answer(&state, "room", "cyd", "q1", 0).await.unwrap());

        sleep(QUESTION_WINDOW + SCOREBOARD_PAUSE + Duration::from_millis(100)).await;
        wait_for_question(&state, "room", "q2").await;

        // q2: bob first (15), ana second (14) -> both at 29, a perfect tie.
        assert!(submit_answer(&state, "room", "bob", "q2", 1).await.unwrap());
        assert!(submit_answer(&state, "room", "ana", "q2", 1).await.unwrap());

        sleep(QUESTION_WINDOW + SCOREBOARD_PAUSE + Duration::from_millis(100)).await;
        settle().await;

        let session = game_service::get_session(&state, "room").await.unwrap();
        assert_eq!(session.phase, SessionPhase::Tiebreak);
        let finalists: Vec<&str> = session
            .players
            .iter()
            .filter(|p| p.is_tied_finalist)
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(finalists, vec!["ana", "bob"]);

        let tiebreak_started = events(&state, "room").await.iter().any(|e| {
            matches!(
                &e.payload,
                EventPayload::TiebreakStart { finalist_ids }
                    if finalist_ids == &vec!["ana".to_string(), "bob".to_string()]
            )
        });
        assert!(tiebreak_started);

        wait_for_question(&state, "room", "qb").await;

        // Only finalists may answer the bonus question.
        assert!(!submit_answer(&state, "room", "cyd", "qb", 0).await.unwrap());
        assert!(submit_answer(&state, "room", "ana", "qb", 0).await.unwrap());

        sleep(QUESTION_WINDOW + SCOREBOARD_PAUSE + Duration::from_millis(100)).await;
        settle().await;

        let session = game_service::get_session(&state, "room").await.unwrap();
        assert_eq!(session.phase, SessionPhase::Finished);
        assert!(session.players.iter().all(|p| !p.is_tied_finalist));

        let game_over = events(&state, "room")
            .await
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::GameOver { leaderboard } => Some(leaderboard.clone()),
                _ => None,
            })
            .expect("game_over event");
        assert_eq!(game_over[0].id, "ana");
        assert_eq!(game_over[0].score, 29 + 15);
    }

    #[tokio::test(start_paused = true)]
    async fn a_unique_leader_finishes_without_a_tiebreak() {
        let state = test_state().await;
        for name in ["ana", "bob", "cyd"] {
            join(&state, "room", name).await.unwrap();
        }
        set_questions(&state, "room", vec![question("q1", 1)], question("qb", 0))
            .await
            .unwrap();

        start(&state, "room").await.unwrap();
        wait_for_question(&state, "room", "q1").await;
        assert!(submit_answer(&state, "room", "ana", "q1", 1).await.unwrap());

        sleep(QUESTION_WINDOW + SCOREBOARD_PAUSE + Duration::from_millis(100)).await;
        settle().await;

        let session = game_service::get_session(&state, "room").await.unwrap();
        assert_eq!(session.phase, SessionPhase::Finished);

        let kinds: Vec<&str> = events(&state, "room")
            .await
            .iter()
            .map(|e| e.payload.kind())
            .collect();
        assert!(!kinds.contains(&"tiebreak_start"));
        assert_eq!(kinds.last(), Some(&"game_over"));
    }

    #[tokio::test(start_paused = true)]
    async fn scoreboard_events_carry_the_sorted_leaderboard() {
        let state = test_state().await;
        for name in ["ana", "bob", "cyd"] {
            join(&state, "room", name).await.unwrap();
        }
        set_questions(&state, "room", vec![question("q1", 1)], question("qb", 0))
            .await
            .unwrap();

        start(&state, "room").await.unwrap();
        wait_for_question(&state, "room", "q1").await;
        assert!(submit_answer(&state, "room", "bob", "q1", 1).await.unwrap());

        sleep(QUESTION_WINDOW + Duration::from_millis(100)).await;
        settle().await;

        let scoreboard = events(&state, "room")
            .await
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::Scoreboard { leaderboard, .. } => Some(leaderboard.clone()),
                _ => None,
            })
            .expect("scoreboard event");
        assert_eq!(scoreboard[0].id, "bob");
        assert_eq!(scoreboard[0].score, 15);
        // Remaining zero-score players in alphabetical order.
        assert_eq!(scoreboard[1].id, "ana");
        assert_eq!(scoreboard[2].id, "cyd");
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_awards_match_the_scoring_table() {
        let state = test_state().await;
        for name in ["ana", "bob", "cyd"] {
            join(&state, "room", name).await.unwrap();
        }
        set_questions(&state, "room", vec![question("q1", 2)], question("qb", 0))
            .await
            .unwrap();

        start(&state, "room").await.unwrap();
        wait_for_question(&state, "room", "q1").await;
        assert!(submit_answer(&state, "room", "cyd", "q1", 2).await.unwrap());
        assert!(submit_answer(&state, "room", "ana", "q1", 2).await.unwrap());
        assert!(!submit_answer(&state, "room", "bob", "q1", 0).await.unwrap());

        sleep(QUESTION_WINDOW + Duration::from_millis(100)).await;
        settle().await;

        let awards = events(&state, "room")
            .await
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::Reveal { awards, .. } => Some(awards.clone()),
                _ => None,
            })
            .expect("reveal event");
        assert_eq!(awards["cyd"], 15);
        assert_eq!(awards["ana"], 14);
        assert!(!awards.contains_key("bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn a_reset_mid_game_strands_the_inflight_cycle() {
        let state = test_state().await;
        for name in ["ana", "bob", "cyd"] {
            join(&state, "room", name).await.unwrap();
        }
        set_questions(&state, "room", vec![question("q1", 1)], question("qb", 0))
            .await
            .unwrap();

        start(&state, "room").await.unwrap();
        wait_for_question(&state, "room", "q1").await;

        reset(&state, "room").await.unwrap();

        // Let the stranded cycle's timers fire well past the full cycle.
        sleep(QUESTION_WINDOW + SCOREBOARD_PAUSE + Duration::from_secs(5)).await;
        settle().await;

        let session = game_service::get_session(&state, "room").await.unwrap();
        assert_eq!(session.phase, SessionPhase::Lobby);
        assert!(session.players.is_empty());

        // Nothing after the reset marker except the empty roster publish.
        let kinds: Vec<&str> = events(&state, "room")
            .await
            .iter()
            .map(|e| e.payload.kind())
            .collect();
        assert_eq!(kinds, vec!["session_reset", "players_update"]);
    }
}
