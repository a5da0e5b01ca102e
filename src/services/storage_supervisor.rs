//! Background maintenance tasks.
//!
//! Two loops run for the lifetime of the process: the storage supervisor,
//! which keeps a session store installed and toggles degraded mode when the
//! database drops, and the session sweeper, which evicts per-session
//! in-process residue (lock, epoch, SSE hub) once a finished session has
//! gone idle, so those maps cannot grow without bound.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::SessionPhase,
        session_store::{SessionStore, memory::MemorySessionStore},
    },
    state::SharedState,
};

#[cfg(feature = "mongo-store")]
use crate::dao::session_store::mongodb::{MongoConfig, MongoSessionStore};

/// How long a finished session's residue survives untouched before eviction.
const STALE_SESSION_TTL: Duration = Duration::from_secs(15 * 60);
/// Sweep cadence.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Cadence of health pings against a live store.
const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Install the in-process backend; used when no database is configured.
pub async fn install_memory_store(state: &SharedState) {
    state
        .install_store(Arc::new(MemorySessionStore::new()))
        .await;
    info!("installed in-memory session store");
}

/// Supervise the MongoDB connection: connect, ping periodically, and on
/// failure drop to degraded mode and reconnect with exponential backoff.
#[cfg(feature = "mongo-store")]
pub async fn run_mongo_supervisor(state: SharedState, uri: String, db_name: Option<String>) {
    let initial_delay = Duration::from_secs(1);
    let max_delay = Duration::from_secs(10);
    let mut delay = initial_delay;

    loop {
        if let Some(store) = state.session_store().await {
            match store.health_check().await {
                Ok(()) => {
                    delay = initial_delay;
                    sleep(HEALTH_INTERVAL).await;
                }
                Err(err) => {
                    warn!(error = %err, "storage ping failed; entering degraded mode");
                    state.clear_store().await;
                    sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
            continue;
        }

        match connect(&uri, db_name.as_deref()).await {
            Ok(store) => {
                info!("connected to MongoDB; leaving degraded mode");
                state.install_store(Arc::new(store)).await;
                delay = initial_delay;
            }
            Err(err) => {
                warn!(error = %err, "MongoDB connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

#[cfg(feature = "mongo-store")]
async fn connect(
    uri: &str,
    db_name: Option<&str>,
) -> Result<MongoSessionStore, crate::dao::session_store::mongodb::MongoDaoError> {
    let config = MongoConfig::from_uri(uri, db_name).await?;
    MongoSessionStore::connect(config).await
}

/// Evict in-process residue for sessions that finished and went idle. The
/// persistent documents are never touched; a late joiner on the same id
/// recreates the lock and hub lazily.
pub async fn run_session_sweeper(state: SharedState) {
    loop {
        sleep(SWEEP_INTERVAL).await;

        let Some(store) = state.session_store().await else {
            continue;
        };

        for session_id in state.tracked_sessions() {
            match store.find_session(&session_id).await {
                Ok(Some(session)) => {
                    let idle = session
                        .updated_at
                        .elapsed()
                        .map(|elapsed| elapsed >= STALE_SESSION_TTL)
                        .unwrap_or(false);
                    if session.phase == SessionPhase::Finished && idle {
                        debug!(session_id = %session_id, "evicting stale session residue");
                        state.evict_session_residue(&session_id);
                    }
                }
                // No document yet (join in flight); leave the lock alone.
                Ok(None) => {}
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "sweep lookup failed");
                    break;
                }
            }
        }
    }
}
