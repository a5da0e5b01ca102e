use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Registry of per-session broadcast hubs backing the SSE relay.
///
/// Hubs are created lazily on first subscription or broadcast and evicted by
/// the stale-session sweeper together with the session's lock and epoch.
pub struct SessionHubs {
    hubs: DashMap<String, SseHub>,
    capacity: usize,
}

impl SessionHubs {
    /// Registry whose hubs buffer up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to a session's stream, creating the hub on first use.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(session_id.to_owned())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Relay an event to the session's live subscribers, if any.
    pub fn broadcast(&self, session_id: &str, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(session_id) {
            hub.broadcast(event);
        }
    }

    /// Drop a session's hub; active subscribers see their stream end.
    pub fn remove(&self, session_id: &str) {
        self.hubs.remove(session_id);
    }
}

/// Broadcast hub wrapper, one per session.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel.
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
