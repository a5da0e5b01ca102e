//! Object storage for question images.
//!
//! Orthogonal to the game engine: an upload failure is reported to the admin
//! and never touches session state. The local-disk backend stores blobs under
//! a configured root that the server exposes statically.

use std::path::PathBuf;

use futures::future::BoxFuture;
use tokio::fs;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

/// Object storage contract: store one image, get back the URL to embed as a
/// question's `image_url`.
pub trait MediaStore: Send + Sync {
    /// Persist `content` for the given session/question and return its URL.
    fn put(
        &self,
        session_id: &str,
        question_id: &str,
        filename: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> BoxFuture<'static, StorageResult<String>>;
}

/// [`MediaStore`] writing blobs under a local directory, one subdirectory per
/// session, with a uuid suffix so re-uploads never collide.
#[derive(Clone)]
pub struct FsMediaStore {
    root: PathBuf,
    public_base: String,
}

impl FsMediaStore {
    /// Store rooted at `root`; returned URLs are prefixed with `public_base`.
    pub fn new(root: PathBuf, public_base: &str) -> Self {
        Self {
            root,
            public_base: public_base.trim_end_matches('/').to_owned(),
        }
    }
}

impl MediaStore for FsMediaStore {
    fn put(
        &self,
        session_id: &str,
        question_id: &str,
        filename: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        let question_id = question_id.to_owned();
        let extension = extension_for(filename, content_type);

        Box::pin(async move {
            let blob_name = format!("{question_id}-{}{extension}", Uuid::new_v4().simple());
            let directory = store.root.join(&session_id);

            fs::create_dir_all(&directory).await.map_err(|source| {
                StorageError::unavailable(
                    format!("creating media directory for session `{session_id}`"),
                    source,
                )
            })?;
            fs::write(directory.join(&blob_name), content)
                .await
                .map_err(|source| {
                    StorageError::unavailable(format!("writing media blob `{blob_name}`"), source)
                })?;

            Ok(format!(
                "{}/{}/{}",
                store.public_base, session_id, blob_name
            ))
        })
    }
}

/// Carry the uploaded file's extension when present, otherwise derive one
/// from the declared content type for the common image formats.
fn extension_for(filename: &str, content_type: Option<&str>) -> String {
    if let Some((_, ext)) = filename.rsplit_once('.') {
        if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format!(".{}", ext.to_ascii_lowercase());
        }
    }

    match content_type {
        Some("image/png") => ".png".into(),
        Some("image/jpeg") => ".jpg".into(),
        Some("image/gif") => ".gif".into(),
        Some("image/webp") => ".webp".into(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_the_filename() {
        assert_eq!(extension_for("photo.PNG", Some("image/jpeg")), ".png");
    }

    #[test]
    fn extension_falls_back_to_content_type() {
        assert_eq!(extension_for("photo", Some("image/webp")), ".webp");
        assert_eq!(extension_for("photo", None), "");
    }

    #[test]
    fn suspicious_extensions_are_ignored() {
        assert_eq!(extension_for("photo.p/ng", Some("image/png")), ".png");
    }
}
