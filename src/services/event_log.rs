//! Append-only per-session event log.
//!
//! Every state change the engine makes becomes visible to the outside world
//! exclusively through this log. Sequence numbers come from the store's
//! atomic increment-and-fetch, not from the session lock, so the scheduler
//! and the transport layer can append independently without ever producing a
//! duplicate `seq`.

use tracing::warn;

use crate::{
    clock,
    dao::{
        models::{EventEntity, EventPayload},
        session_store::SessionStore,
    },
    dto::{events::EventRecord, sse::ServerEvent},
    error::ServiceError,
    state::SharedState,
};

/// Default page size served to polling clients.
pub const DEFAULT_LIST_LIMIT: i64 = 200;

/// Append a payload to the session's log and return the assigned sequence
/// number. The stored record is also relayed to live SSE subscribers.
pub async fn append(
    state: &SharedState,
    session_id: &str,
    payload: EventPayload,
) -> Result<i64, ServiceError> {
    let store = state.require_store().await?;
    let seq = store.next_event_seq(session_id).await?;
    let event = EventEntity {
        session_id: session_id.to_owned(),
        seq,
        timestamp: clock::now_ts(),
        payload,
    };
    store.insert_event(event.clone()).await?;
    relay(state, &event);
    Ok(seq)
}

/// Events with `seq > after` in ascending order, capped at `limit`.
pub async fn list(
    state: &SharedState,
    session_id: &str,
    after: i64,
    limit: i64,
) -> Result<Vec<EventEntity>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.events_after(session_id, after, limit).await?)
}

/// Wipe the session's log, re-seed its counter, and append the synthetic
/// `session_reset` marker (always `seq` 1) so long-lived subscribers discard
/// previously derived state.
pub async fn reset(state: &SharedState, session_id: &str) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    store.delete_events(session_id).await?;
    store.reset_event_counter(session_id).await?;
    append(state, session_id, EventPayload::SessionReset).await?;
    Ok(())
}

/// Broadcast a freshly stored record to the session's live subscribers.
fn relay(state: &SharedState, event: &EventEntity) {
    let record = EventRecord::from(event.clone());
    match ServerEvent::json(event.payload.kind(), event.seq, &record) {
        Ok(server_event) => state.hubs().broadcast(&event.session_id, server_event),
        Err(err) => warn!(
            session_id = %event.session_id,
            seq = event.seq,
            error = %err,
            "failed to serialize event for SSE relay"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::session_store::memory::MemorySessionStore, state::AppState,
    };

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_store(Arc::new(MemorySessionStore::new()))
            .await;
        state
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequence_numbers() {
        let state = test_state().await;
        let first = append(&state, "room", EventPayload::SessionReset)
            .await
            .unwrap();
        let second = append(&state, "room", EventPayload::SessionReset)
            .await
            .unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn concurrent_appends_never_share_a_sequence_number() {
        let state = test_state().await;
        let mut handles = Vec::new();
        for _ in 0..20 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                append(&state, "room", EventPayload::SessionReset)
                    .await
                    .unwrap()
            }));
        }

        let mut seqs = Vec::new();
        for handle in handles {
            seqs.push(handle.await.unwrap());
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=20).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn reset_leaves_a_single_session_reset_marker_at_seq_one() {
        let state = test_state().await;
        for _ in 0..3 {
            append(&state, "room", EventPayload::SessionReset)
                .await
                .unwrap();
        }

        reset(&state, "room").await.unwrap();

        let events = list(&state, "room", 0, DEFAULT_LIST_LIMIT).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 1);
        assert!(matches!(events[0].payload, EventPayload::SessionReset));
    }

    #[tokio::test]
    async fn list_resumes_from_the_cursor() {
        let state = test_state().await;
        for _ in 0..5 {
            append(&state, "room", EventPayload::SessionReset)
                .await
                .unwrap();
        }

        let page = list(&state, "room", 3, 10).await.unwrap();
        assert_eq!(page.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[tokio::test]
    async fn live_subscribers_receive_appended_events() {
        let state = test_state().await;
        let mut receiver = state.hubs().subscribe("room");

        append(&state, "room", EventPayload::SessionReset)
            .await
            .unwrap();

        let relayed = receiver.recv().await.unwrap();
        assert_eq!(relayed.seq, 1);
        assert_eq!(relayed.event, "session_reset");
    }
}
