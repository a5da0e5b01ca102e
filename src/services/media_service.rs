//! Question image upload glue.
//!
//! Uploads run before `setQuestions` is called; a failure here surfaces to
//! the admin and never touches any session document.

use tracing::info;

use crate::{
    dao::media_store::MediaStore, dto::validation::validate_session_id, error::ServiceError,
    state::SharedState,
};

/// Store an uploaded question image and return its public URL.
pub async fn upload_question_image(
    state: &SharedState,
    session_id: &str,
    question_id: &str,
    filename: &str,
    content: Vec<u8>,
    content_type: Option<&str>,
) -> Result<String, ServiceError> {
    let Some(media) = state.media_store() else {
        return Err(ServiceError::Degraded);
    };

    // Both ids end up in the blob path, so hold them to the same slug rules
    // as session ids.
    validate_session_id(session_id)
        .map_err(|_| ServiceError::InvalidInput("invalid session id".into()))?;
    validate_session_id(question_id)
        .map_err(|_| ServiceError::InvalidInput("invalid question id".into()))?;
    if content.is_empty() {
        return Err(ServiceError::InvalidInput("uploaded file was empty".into()));
    }

    let url = media
        .put(session_id, question_id, filename, content, content_type)
        .await?;

    info!(session_id, question_id, url = %url, "stored question image");
    Ok(url)
}
