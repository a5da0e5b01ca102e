use serde::Serialize;

/// Dispatched payload carried across a session's SSE channel.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// SSE event name: the payload kind.
    pub event: String,
    /// Sequence number; lets the stream dedupe replayed events against the
    /// live feed.
    pub seq: i64,
    /// Pre-serialized JSON body.
    pub data: String,
}

impl ServerEvent {
    /// Serialize `payload` into the SSE data field.
    pub fn json<T>(event: impl Into<String>, seq: i64, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            seq,
            data: serde_json::to_string(payload)?,
        })
    }
}
