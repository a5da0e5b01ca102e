/// Always-available in-process backend, also used by the test suite.
pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB-backed document store.
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::{
    models::{AnswerEntity, EventEntity, SessionEntity},
    storage::StorageResult,
};

/// Abstraction over the document store holding sessions, answers, and the
/// per-session event log.
///
/// The engine only ever needs point lookups, whole-document upserts, one
/// conditional insert (answers), one atomic increment-and-fetch (the event
/// counter), a single greater-than scan (event replay), and bulk deletes.
/// Anything richer belongs to the backend, not to this contract.
pub trait SessionStore: Send + Sync {
    /// Point lookup of a session document by id.
    fn find_session(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;

    /// Upsert the whole session document; last write wins per session.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Insert an answer unless one already exists for the same
    /// `(session, player, question)` triple. Returns whether the insert
    /// happened; a `false` result is the duplicate-submission signal.
    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<bool>>;

    /// All recorded answers for one question of a session, in arrival order.
    fn answers_for_question(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;

    /// Drop every answer recorded for the session.
    fn delete_answers(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>>;

    /// Atomically increment the session's event counter and return the new
    /// value. Two concurrent calls for the same session must never observe
    /// the same number.
    fn next_event_seq(&self, session_id: &str) -> BoxFuture<'static, StorageResult<i64>>;

    /// Persist an event record stamped by [`SessionStore::next_event_seq`].
    fn insert_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Events with `seq > after` in ascending order, capped at `limit`.
    fn events_after(
        &self,
        session_id: &str,
        after: i64,
        limit: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<EventEntity>>>;

    /// Drop every stored event for the session.
    fn delete_events(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>>;

    /// Re-seed the session's event counter at zero so the next append is 1.
    fn reset_event_counter(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>>;

    /// Backend connectivity probe used by the health endpoint and supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
