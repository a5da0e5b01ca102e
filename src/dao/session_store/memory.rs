//! In-process [`SessionStore`] backend.
//!
//! Keeps every collection behind its own mutex so the conditional answer
//! insert and the counter increment are atomic without any database help.
//! Installed at boot when no MongoDB URI is configured, and used throughout
//! the test suite.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;

use crate::dao::{
    models::{AnswerEntity, EventEntity, SessionEntity},
    session_store::SessionStore,
    storage::StorageResult,
};

/// Cheaply cloneable in-memory store; clones share the same collections.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Collections>,
}

#[derive(Default)]
struct Collections {
    sessions: Mutex<HashMap<String, SessionEntity>>,
    answers: Mutex<Vec<AnswerEntity>>,
    counters: Mutex<HashMap<String, i64>>,
    events: Mutex<Vec<EventEntity>>,
}

impl MemorySessionStore {
    /// Fresh store with empty collections.
    pub fn new() -> Self {
        Self::default()
    }
}

// A poisoned mutex only witnesses a panic in another task; the guarded data
// is still structurally valid, so recover it instead of wedging the session.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStore for MemorySessionStore {
    fn find_session(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        let id = id.to_owned();
        Box::pin(async move { Ok(lock(&store.inner.sessions).get(&id).cloned()) })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            lock(&store.inner.sessions).insert(session.id.clone(), session);
            Ok(())
        })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut answers = lock(&store.inner.answers);
            let duplicate = answers.iter().any(|existing| {
                existing.session_id == answer.session_id
                    && existing.player_id == answer.player_id
                    && existing.question_id == answer.question_id
            });
            if duplicate {
                return Ok(false);
            }
            answers.push(answer);
            Ok(true)
        })
    }

    fn answers_for_question(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        let question_id = question_id.to_owned();
        Box::pin(async move {
            Ok(lock(&store.inner.answers)
                .iter()
                .filter(|a| a.session_id == session_id && a.question_id == question_id)
                .cloned()
                .collect())
        })
    }

    fn delete_answers(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            lock(&store.inner.answers).retain(|a| a.session_id != session_id);
            Ok(())
        })
    }

    fn next_event_seq(&self, session_id: &str) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            let mut counters = lock(&store.inner.counters);
            let seq = counters.entry(session_id).or_insert(0);
            *seq += 1;
            Ok(*seq)
        })
    }

    fn insert_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            lock(&store.inner.events).push(event);
            Ok(())
        })
    }

    fn events_after(
        &self,
        session_id: &str,
        after: i64,
        limit: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<EventEntity>>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            let mut page: Vec<EventEntity> = lock(&store.inner.events)
                .iter()
                .filter(|e| e.session_id == session_id && e.seq > after)
                .cloned()
                .collect();
            page.sort_by_key(|e| e.seq);
            if limit > 0 {
                page.truncate(limit as usize);
            }
            Ok(page)
        })
    }

    fn delete_events(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            lock(&store.inner.events).retain(|e| e.session_id != session_id);
            Ok(())
        })
    }

    fn reset_event_counter(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            lock(&store.inner.counters).insert(session_id, 0);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(session: &str, player: &str, question: &str, ts: f64) -> AnswerEntity {
        AnswerEntity {
            session_id: session.into(),
            player_id: player.into(),
            question_id: question.into(),
            option_index: 0,
            is_correct: true,
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn duplicate_answer_is_rejected_without_a_second_record() {
        let store = MemorySessionStore::new();
        assert!(store.insert_answer(answer("s", "ana", "q1", 1.0)).await.unwrap());
        assert!(!store.insert_answer(answer("s", "ana", "q1", 2.0)).await.unwrap());

        let stored = store.answers_for_question("s", "q1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].timestamp, 1.0);
    }

    #[tokio::test]
    async fn same_player_may_answer_distinct_questions() {
        let store = MemorySessionStore::new();
        assert!(store.insert_answer(answer("s", "ana", "q1", 1.0)).await.unwrap());
        assert!(store.insert_answer(answer("s", "ana", "q2", 2.0)).await.unwrap());
    }

    #[tokio::test]
    async fn counter_is_strictly_increasing_and_gapless_under_concurrency() {
        let store = MemorySessionStore::new();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.next_event_seq("s").await.unwrap() },
            ));
        }

        let mut seqs = Vec::new();
        for handle in handles {
            seqs.push(handle.await.unwrap());
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=50).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn counters_are_independent_across_sessions() {
        let store = MemorySessionStore::new();
        assert_eq!(store.next_event_seq("a").await.unwrap(), 1);
        assert_eq!(store.next_event_seq("b").await.unwrap(), 1);
        assert_eq!(store.next_event_seq("a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn events_after_pages_in_ascending_seq_order() {
        let store = MemorySessionStore::new();
        for seq in [3, 1, 2] {
            store
                .insert_event(EventEntity {
                    session_id: "s".into(),
                    seq,
                    timestamp: seq as f64,
                    payload: crate::dao::models::EventPayload::SessionReset,
                })
                .await
                .unwrap();
        }

        let page = store.events_after("s", 1, 10).await.unwrap();
        assert_eq!(page.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![2, 3]);

        let capped = store.events_after("s", 0, 2).await.unwrap();
        assert_eq!(capped.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
    }
}
