//! Cover image storage.
//!
//! The catalog only ever stores an opaque reference to a cover image. The
//! bytes live wherever the [`CoverStore`] implementation puts them; the
//! default [`LocalCoverStore`] writes them to a directory that the HTTP layer
//! serves statically.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;

/// Extension used when the uploaded file name carries none.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Longest file extension kept from an uploaded file name.
const MAX_EXTENSION_LEN: usize = 10;

/// Stores cover blobs and hands back opaque references to them.
#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Persist `bytes` and return the reference to record on the work.
    /// `file_name` is the client-supplied name; only its extension is used.
    async fn save(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String, CoreError>;

    /// Remove a previously saved blob. Missing blobs are not an error.
    async fn discard(&self, reference: &str) -> Result<(), CoreError>;

    /// Public URL under which the blob can be retrieved.
    fn url_for(&self, reference: &str) -> String;
}

/// Filesystem-backed [`CoverStore`].
///
/// Blobs are written as `<uuid>.<ext>` inside `dir`; references are the
/// resulting paths and URLs are `<url_prefix>/<file name>`.
#[derive(Debug, Clone)]
pub struct LocalCoverStore {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalCoverStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CoreError::Internal(format!(
                "Failed to create upload dir {}: {e}",
                self.dir.display()
            ))
        })
    }

    /// Map a reference back to a path inside `dir`. Only the file name of the
    /// reference is honoured, so a reference can never point outside `dir`.
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        Path::new(reference)
            .file_name()
            .map(|name| self.dir.join(name))
    }
}

#[async_trait]
impl CoverStore for LocalCoverStore {
    async fn save(&self, bytes: &[u8], file_name: Option<&str>) -> Result<String, CoreError> {
        self.ensure_dir().await?;

        let name = format!("{}.{}", Uuid::new_v4().simple(), extension_of(file_name));
        let dest = self.dir.join(&name);
        tokio::fs::write(&dest, bytes).await.map_err(|e| {
            CoreError::Internal(format!("Failed to write cover {}: {e}", dest.display()))
        })?;

        tracing::debug!(path = %dest.display(), size = bytes.len(), "Cover saved");
        Ok(dest.to_string_lossy().into_owned())
    }

    async fn discard(&self, reference: &str) -> Result<(), CoreError> {
        let Some(path) = self.resolve(reference) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Cover discarded");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Internal(format!(
                "Failed to remove cover {}: {e}",
                path.display()
            ))),
        }
    }

    fn url_for(&self, reference: &str) -> String {
        let name = Path::new(reference)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{name}", self.url_prefix)
    }
}

/// Lowercased extension of an uploaded file name, or [`DEFAULT_EXTENSION`]
/// when it is missing or not plain alphanumeric.
fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_rules() {
        assert_eq!(extension_of(Some("cover.JPG")), "jpg");
        assert_eq!(extension_of(Some("scan.final.png")), "png");
        assert_eq!(extension_of(Some("noext")), "bin");
        assert_eq!(extension_of(Some("weird.p/g")), "bin");
        assert_eq!(extension_of(None), "bin");
    }

    #[tokio::test]
    async fn save_then_discard() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCoverStore::new(dir.path().join("uploads"), "/uploads/");

        let reference = store.save(b"\x89PNG", Some("cover.png")).await.unwrap();
        let path = PathBuf::from(&reference);
        assert!(path.starts_with(store.dir()));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"\x89PNG");

        let url = store.url_for(&reference);
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));

        store.discard(&reference).await.unwrap();
        assert!(!path.exists());

        // Discarding twice is fine.
        store.discard(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn discard_stays_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.txt");
        tokio::fs::write(&outside, b"keep").await.unwrap();

        let store = LocalCoverStore::new(dir.path().join("uploads"), "/uploads");
        store
            .discard(outside.to_str().unwrap())
            .await
            .unwrap();

        assert!(outside.exists());
    }
}
