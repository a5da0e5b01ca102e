use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save session `{id}`")]
    SaveSession {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load session `{id}`")]
    LoadSession {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to record answer for session `{session_id}`")]
    InsertAnswer {
        session_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list answers for session `{session_id}`")]
    ListAnswers {
        session_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete answers for session `{session_id}`")]
    DeleteAnswers {
        session_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to advance event counter for session `{session_id}`")]
    AdvanceCounter {
        session_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to append event for session `{session_id}`")]
    InsertEvent {
        session_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list events for session `{session_id}`")]
    ListEvents {
        session_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete events for session `{session_id}`")]
    DeleteEvents {
        session_id: String,
        #[source]
        source: MongoError,
    },
}
