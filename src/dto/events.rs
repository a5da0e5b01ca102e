use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dao::models::{EventEntity, EventPayload};

/// One stored event, exactly as replayed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventRecord {
    /// Strictly increasing per-session sequence number.
    pub seq: i64,
    /// Append time (epoch seconds).
    pub timestamp: f64,
    /// Typed payload; the embedded `type` tag names the kind.
    pub payload: EventPayload,
}

impl From<EventEntity> for EventRecord {
    fn from(value: EventEntity) -> Self {
        Self {
            seq: value.seq,
            timestamp: value.timestamp,
            payload: value.payload,
        }
    }
}

/// Page of events plus the cursor to resume from.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventsPage {
    pub events: Vec<EventRecord>,
    /// Highest sequence number in `events`, or the request cursor when the
    /// page is empty.
    pub latest_seq: Option<i64>,
}

/// Cursor query parameters shared by the polling and streaming endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct EventCursorQuery {
    /// Only events with `seq` strictly greater than this are returned.
    pub after: Option<i64>,
    /// Page size cap (polling endpoint only).
    pub limit: Option<i64>,
}
