//! Game engine facade.
//!
//! Entry points the transport layer calls: `create_or_get`, `join`,
//! `set_questions`, `start`, `reset`, and `submit_answer`. Every mutation of
//! the session document happens while holding that session's lock, except
//! `submit_answer`, which stays lock-free and relies on the store's atomic
//! conditional insert instead.

use std::time::SystemTime;

use tracing::info;

use crate::{
    clock,
    dao::{
        models::{
            AnswerEntity, EventPayload, PlayerEntity, QuestionEntity, SessionEntity, SessionPhase,
        },
        session_store::SessionStore,
    },
    error::ServiceError,
    services::{event_log, scheduler},
    state::SharedState,
};

/// Hard roster cap per session.
pub const MAX_PLAYERS: usize = 30;
/// Minimum roster size required to start a game.
pub const MIN_PLAYERS: usize = 3;

/// Create the session as a fresh lobby if the id is unknown, otherwise
/// return the existing document. A newly created session gets its event log
/// reset so replay always begins with the `session_reset` marker.
pub async fn create_or_get(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionEntity, ServiceError> {
    let lock = state.session_lock(session_id);
    let _guard = lock.lock().await;

    if let Some(existing) = load_session(state, session_id).await? {
        return Ok(existing);
    }

    let mut session = SessionEntity::new(session_id.to_owned());
    persist(state, &mut session).await?;
    event_log::reset(state, session_id).await?;
    info!(session_id, "session created");
    Ok(session)
}

/// Fetch a session, failing with `NotFound` for unknown ids.
pub async fn get_session(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionEntity, ServiceError> {
    load_session(state, session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))
}

/// Add a player to the roster, creating the session implicitly on first
/// join. Publishes the updated roster to all subscribers.
pub async fn join(
    state: &SharedState,
    session_id: &str,
    username: &str,
) -> Result<PlayerEntity, ServiceError> {
    let lock = state.session_lock(session_id);
    let _guard = lock.lock().await;

    let mut session = match load_session(state, session_id).await? {
        Some(session) => session,
        None => SessionEntity::new(session_id.to_owned()),
    };

    if session.players.len() >= MAX_PLAYERS {
        return Err(ServiceError::CapacityExceeded(format!(
            "session `{session_id}` is full ({MAX_PLAYERS} players max)"
        )));
    }

    let player = PlayerEntity::new(derive_player_id(&session, username), username.to_owned());
    session.players.push(player.clone());
    persist(state, &mut session).await?;
    publish_players(state, session_id, &session.players).await?;

    info!(session_id, player_id = %player.id, "player joined");
    Ok(player)
}

/// Replace the question set and the bonus question wholesale. Intended for
/// the lobby but callable at any time; the running cycle keeps the question
/// it already captured.
pub async fn set_questions(
    state: &SharedState,
    session_id: &str,
    questions: Vec<QuestionEntity>,
    bonus: QuestionEntity,
) -> Result<(), ServiceError> {
    let lock = state.session_lock(session_id);
    let _guard = lock.lock().await;

    let mut session = match load_session(state, session_id).await? {
        Some(session) => session,
        None => SessionEntity::new(session_id.to_owned()),
    };
    session.questions = questions;
    session.bonus_question = Some(bonus);
    persist(state, &mut session).await?;

    info!(
        session_id,
        count = session.questions.len(),
        "question set updated"
    );
    Ok(())
}

/// Start a fresh game on the session: zero all scores, clear answers and the
/// event log, then hand off to the phase scheduler. Returns once the first
/// cycle is scheduled, not once the game finishes.
pub async fn start(state: &SharedState, session_id: &str) -> Result<(), ServiceError> {
    let lock = state.session_lock(session_id);
    let _guard = lock.lock().await;

    let mut session = load_session(state, session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{session_id}` not found")))?;

    if session.players.len() < MIN_PLAYERS
        || session.questions.is_empty()
        || session.bonus_question.is_none()
    {
        return Err(ServiceError::FailedPrecondition(format!(
            "cannot start: need at least {MIN_PLAYERS} players, a question set, and a bonus question"
        )));
    }

    // Fresh game on a reused session id: wipe every per-game trace.
    for player in &mut session.players {
        player.score = 0;
        player.is_tied_finalist = false;
    }
    session.phase = SessionPhase::Playing;
    session.current_question_index = 0;
    session.question_deadline_ts = None;

    let store = state.require_store().await?;
    store.delete_answers(session_id).await?;
    event_log::reset(state, session_id).await?;
    persist(state, &mut session).await?;
    publish_players(state, session_id, &session.players).await?;

    let epoch = state.bump_epoch(session_id);
    scheduler::spawn_question_cycle(state.clone(), session_id.to_owned(), epoch, false);

    info!(session_id, epoch, "game started");
    Ok(())
}

/// Force the session back to an empty lobby: clear the roster, answers, and
/// event log, and strand any in-flight phase sequence.
pub async fn reset(state: &SharedState, session_id: &str) -> Result<(), ServiceError> {
    let lock = state.session_lock(session_id);
    let _guard = lock.lock().await;

    let mut session = match load_session(state, session_id).await? {
        Some(session) => session,
        None => SessionEntity::new(session_id.to_owned()),
    };

    let store = state.require_store().await?;
    store.delete_answers(session_id).await?;

    session.phase = SessionPhase::Lobby;
    session.current_question_index = -1;
    session.question_deadline_ts = None;
    session.players.clear();
    persist(state, &mut session).await?;

    // Invalidate the generation token before touching the log so a stale
    // cycle waking up mid-reset cannot append after the marker.
    let epoch = state.bump_epoch(session_id);
    event_log::reset(state, session_id).await?;
    publish_players(state, session_id, &session.players).await?;

    info!(session_id, epoch, "session reset");
    Ok(())
}

/// Record one player's answer to the active question.
///
/// Returns `Ok(true)` only when the answer was accepted *and* correct; every
/// rejection (unknown session, closed window, wrong question, non-finalist
/// during the tiebreak, duplicate submission) yields `Ok(false)` so clients
/// can submit idempotently. No points are revealed at submission time.
pub async fn submit_answer(
    state: &SharedState,
    session_id: &str,
    player_id: &str,
    question_id: &str,
    option_index: usize,
) -> Result<bool, ServiceError> {
    let Some(session) = load_session(state, session_id).await? else {
        return Ok(false);
    };
    if !session.phase.accepts_answers() {
        return Ok(false);
    }
    if let Some(deadline) = session.question_deadline_ts {
        if clock::now_ts() > deadline {
            return Ok(false);
        }
    }
    let Some(question) = session.active_question() else {
        return Ok(false);
    };
    if question.id != question_id {
        return Ok(false);
    }
    if session.phase == SessionPhase::Tiebreak && !session.is_finalist(player_id) {
        return Ok(false);
    }

    let answer = AnswerEntity {
        session_id: session_id.to_owned(),
        player_id: player_id.to_owned(),
        question_id: question_id.to_owned(),
        option_index,
        is_correct: option_index == question.correct_index,
        timestamp: clock::now_ts(),
    };
    let is_correct = answer.is_correct;

    let inserted = state.require_store().await?.insert_answer(answer).await?;
    if !inserted {
        // Duplicate for this (player, question): idempotent rejection.
        return Ok(false);
    }

    Ok(is_correct)
}

/// Load a session document without failing on unknown ids.
pub(crate) async fn load_session(
    state: &SharedState,
    session_id: &str,
) -> Result<Option<SessionEntity>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.find_session(session_id).await?)
}

/// Upsert the session document, stamping `updated_at`.
pub(crate) async fn persist(
    state: &SharedState,
    session: &mut SessionEntity,
) -> Result<(), ServiceError> {
    session.updated_at = SystemTime::now();
    let store = state.require_store().await?;
    store.save_session(session.clone()).await?;
    Ok(())
}

/// Publish the full roster as a `players_update` event.
pub(crate) async fn publish_players(
    state: &SharedState,
    session_id: &str,
    players: &[PlayerEntity],
) -> Result<(), ServiceError> {
    event_log::append(
        state,
        session_id,
        EventPayload::PlayersUpdate {
            players: players.to_vec(),
        },
    )
    .await?;
    Ok(())
}

/// Derive the player id from the username: lower-cased, spaces to hyphens.
/// The first collision keeps the historical roster-length suffix; the loop
/// then keeps incrementing so rejoin collisions cannot mint a duplicate id.
fn derive_player_id(session: &SessionEntity, username: &str) -> String {
    let base = username.to_lowercase().replace(' ', "-");
    if !session.players.iter().any(|p| p.id == base) {
        return base;
    }

    let mut suffix = session.players.len() + 1;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !session.players.iter().any(|p| p.id == candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::{SessionStore, memory::MemorySessionStore},
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

    #[tokio::test]
    async fn join_creates_the_session_implicitly() {
        let state = test_state().await;
        let player = join(&state, "room", "Ana").await.unwrap();
        assert_eq!(player.id, "ana");

        let session = get_session(&state, "room").await.unwrap();
        assert_eq!(session.phase, SessionPhase::Lobby);
        assert_eq!(session.players.len(), 1);
    }

    #[tokio::test]
    async fn join_slugifies_usernames_and_disambiguates_collisions() {
        let state = test_state().await;
        let first = join(&state, "room", "Jo Ann").await.unwrap();
        assert_eq!(first.id, "jo-ann");

        let second = join(&state, "room", "JO ANN").await.unwrap();
        assert_eq!(second.id, "jo-ann-2");

        // A third collision must not repeat an already-taken fallback id.
        let third = join(&state, "room", "jo ann").await.unwrap();
        assert_ne!(third.id, first.id);
        assert_ne!(third.id, second.id);
    }

    #[tokio::test]
    async fn the_thirty_first_join_is_rejected_without_mutating_the_roster() {
        let state = test_state().await;
        for n in 0..MAX_PLAYERS {
            join(&state, "room", &format!("player{n}")).await.unwrap();
        }

        let err = join(&state, "room", "late").await.unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded(_)));

        let session = get_session(&state, "room").await.unwrap();
        assert_eq!(session.players.len(), MAX_PLAYERS);
    }

    #[tokio::test]
    async fn start_requires_three_players_questions_and_a_bonus() {
        let state = test_state().await;
        join(&state, "room", "ana").await.unwrap();
        join(&state, "room", "bob").await.unwrap();
        set_questions(&state, "room", vec![question("q1", 0)], question("qb", 0))
            .await
            .unwrap();

        let err = start(&state, "room").await.unwrap_err();
        assert!(matches!(err, ServiceError::FailedPrecondition(_)));

        let session = get_session(&state, "room").await.unwrap();
        assert_eq!(session.phase, SessionPhase::Lobby);
    }

    #[tokio::test]
    async fn reset_then_join_replays_the_reset_marker_first() {
        let state = test_state().await;
        join(&state, "room", "ana").await.unwrap();
        reset(&state, "room").await.unwrap();
        join(&state, "room", "bob").await.unwrap();

        let events = event_log::list(&state, "room", 0, 50).await.unwrap();
        assert!(matches!(events[0].payload, EventPayload::SessionReset));
        assert!(matches!(
            events[1].payload,
            EventPayload::PlayersUpdate { .. }
        ));
        assert_eq!(events[0].seq, 1);
    }

    #[tokio::test]
    async fn duplicate_answers_are_rejected_idempotently() {
        let state = test_state().await;
        let store = state.require_store().await.unwrap();

        let mut session = SessionEntity::new("room".into());
        session.players.push(PlayerEntity::new("ana".into(), "ana".into()));
        session.phase = SessionPhase::Playing;
        session.questions = vec![question("q1", 1)];
        session.current_question_index = 0;
        store.save_session(session).await.unwrap();

        let first = submit_answer(&state, "room", "ana", "q1", 1).await.unwrap();
        let second = submit_answer(&state, "room", "ana", "q1", 1).await.unwrap();
        assert!(first);
        assert!(!second);

        let answers = store.answers_for_question("room", "q1").await.unwrap();
        assert_eq!(answers.len(), 1);
    }

    #[tokio::test]
    async fn answers_are_rejected_outside_open_phases_or_for_stale_questions() {
        let state = test_state().await;
        let store = state.require_store().await.unwrap();

        // Unknown session.
        assert!(!submit_answer(&state, "ghost", "ana", "q1", 0).await.unwrap());

        let mut session = SessionEntity::new("room".into());
        session.players.push(PlayerEntity::new("ana".into(), "ana".into()));
        session.questions = vec![question("q1", 1)];
        session.current_question_index = 0;
        store.save_session(session.clone()).await.unwrap();

        // Lobby phase.
        assert!(!submit_answer(&state, "room", "ana", "q1", 1).await.unwrap());

        // Wrong question id while playing.
        session.phase = SessionPhase::Playing;
        store.save_session(session.clone()).await.unwrap();
        assert!(!submit_answer(&state, "room", "ana", "q9", 1).await.unwrap());

        // Expired deadline.
        session.question_deadline_ts = Some(clock::now_ts() - 1.0);
        store.save_session(session.clone()).await.unwrap();
        assert!(!submit_answer(&state, "room", "ana", "q1", 1).await.unwrap());
    }

    #[tokio::test]
    async fn only_finalists_may_answer_during_the_tiebreak() {
        let state = test_state().await;
        let store = state.require_store().await.unwrap();

        let mut session = SessionEntity::new("room".into());
        let mut ana = PlayerEntity::new("ana".into(), "ana".into());
        ana.is_tied_finalist = true;
        session.players.push(ana);
        session.players.push(PlayerEntity::new("bob".into(), "bob".into()));
        session.phase = SessionPhase::Tiebreak;
        session.bonus_question = Some(question("qb", 0));
        store.save_session(session).await.unwrap();

        assert!(submit_answer(&state, "room", "ana", "qb", 0).await.unwrap());
        assert!(!submit_answer(&state, "room", "bob", "qb", 0).await.unwrap());
    }

    #[tokio::test]
    async fn an_incorrect_answer_is_accepted_but_reported_as_incorrect() {
        let state = test_state().await;
        let store = state.require_store().await.unwrap();

        let mut session = SessionEntity::new("room".into());
        session.players.push(PlayerEntity::new("ana".into(), "ana".into()));
        session.phase = SessionPhase::Playing;
        session.questions = vec![question("q1", 1)];
        session.current_question_index = 0;
        store.save_session(session).await.unwrap();

        assert!(!submit_answer(&state, "room", "ana", "q1", 2).await.unwrap());
        // The record exists even though the answer was wrong.
        let answers = store.answers_for_question("room", "q1").await.unwrap();
        assert_eq!(answers.len(), 1);
        assert!(!answers[0].is_correct);
    }

    #[tokio::test]
    async fn start_zeroes_scores_from_a_previous_run() {
        let state = test_state().await;
        for name in ["ana", "bob", "cyd"] {
            join(&state, "room", name).await.unwrap();
        }
        set_questions(&state, "room", vec![question("q1", 0)], question("qb", 0))
            .await
            .unwrap();

        // Simulate leftover scores from an earlier game.
        let store = state.require_store().await.unwrap();
        let mut session = get_session(&state, "room").await.unwrap();
        session.players[0].score = 42;
        session.players[1].is_tied_finalist = true;
        store.save_session(session).await.unwrap();

        start(&state, "room").await.unwrap();

        let session = get_session(&state, "room").await.unwrap();
        assert!(session.players.iter().all(|p| p.score == 0));
        assert!(session.players.iter().all(|p| !p.is_tied_finalist));
        assert_eq!(session.phase, SessionPhase::Playing);
        assert_eq!(session.current_question_index, 0);
    }
}
