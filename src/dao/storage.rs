use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error surfaced by any storage backend (document store or media store).
///
/// Backend-specific error enums are collapsed into this transport-agnostic
/// shape before they cross the dao boundary; the service layer treats every
/// storage failure as "unavailable" and never retries internally.
#[derive(Debug, Error)]
#[error("storage unavailable: {message}")]
pub struct StorageError {
    message: String,
    #[source]
    source: Box<dyn Error + Send + Sync>,
}

impl StorageError {
    /// Wrap a backend failure together with a short operation description.
    pub fn unavailable(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Box::new(source),
        }
    }
}
