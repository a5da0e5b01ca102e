/// Per-session SSE hub registry.
mod sse;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::{
    config::AppConfig,
    dao::{
        media_store::{FsMediaStore, MediaStore},
        session_store::SessionStore,
    },
    error::ServiceError,
};

pub use self::sse::{SessionHubs, SseHub};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handles plus the per-session
/// coordination primitives (locks, generation tokens, SSE hubs).
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn SessionStore>>>,
    media: Option<Arc<dyn MediaStore>>,
    hubs: SessionHubs,
    locks: DashMap<String, Arc<Mutex<()>>>,
    epochs: DashMap<String, u64>,
}

impl AppState {
    /// Construct the state wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a session store is
    /// installed by the boot sequence or the storage supervisor.
    pub fn new(config: AppConfig) -> SharedState {
        let media = config.media_root().map(|root| {
            Arc::new(FsMediaStore::new(
                root.to_path_buf(),
                config.media_public_base(),
            )) as Arc<dyn MediaStore>
        });
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            media,
            hubs: SessionHubs::new(32),
            locks: DashMap::new(),
            epochs: DashMap::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Session store handle, or [`ServiceError::Degraded`] when none is up.
    pub async fn require_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.session_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a session store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn SessionStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Remove the current session store and enter degraded mode.
    pub async fn clear_store(&self) {
        let mut guard = self.store.write().await;
        guard.take();
    }

    /// Degraded mode is simply the absence of an installed store.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Media store handle, when image storage is configured.
    pub fn media_store(&self) -> Option<Arc<dyn MediaStore>> {
        self.media.clone()
    }

    /// Per-session SSE hub registry.
    pub fn hubs(&self) -> &SessionHubs {
        &self.hubs
    }

    /// Lazily created per-session mutex serializing state-mutating
    /// operations. Answer submission and event appends bypass it.
    pub fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Current generation token for the session's scheduled phase sequence.
    pub fn epoch(&self, session_id: &str) -> u64 {
        self.epochs.get(session_id).map(|entry| *entry).unwrap_or(0)
    }

    /// Invalidate any in-flight phase sequence and return the new token.
    pub fn bump_epoch(&self, session_id: &str) -> u64 {
        let mut entry = self.epochs.entry(session_id.to_owned()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Whether a phase sequence spawned under `token` is still current.
    pub fn epoch_matches(&self, session_id: &str, token: u64) -> bool {
        self.epoch(session_id) == token
    }

    /// Session ids with in-process residue, for the stale-session sweeper.
    pub fn tracked_sessions(&self) -> Vec<String> {
        self.locks.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop a session's in-process residue: lock, epoch, and SSE hub. The
    /// persistent documents are untouched; everything here is recreated
    /// lazily if the session id comes back.
    pub fn evict_session_residue(&self, session_id: &str) {
        self.locks.remove(session_id);
        self.epochs.remove(session_id);
        self.hubs.remove(session_id);
    }
}
