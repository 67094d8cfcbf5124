// Media store - uploaded images written under the uploads directory
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// URL prefix uploaded files are served under.
pub const MEDIA_PREFIX: &str = "/media";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Only image uploads are allowed")]
    UnsupportedType,

    #[error("File too large (max {0} bytes)")]
    TooLarge(usize),

    #[error("Empty upload")]
    Empty,

    #[error("Media IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists the bytes and returns the URL they are reachable at.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, MediaError>;
}

pub type DynMediaStore = Arc<dyn MediaStore>;

pub struct LocalMediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, max_bytes: usize) -> Self {
        Self { root, max_bytes }
    }

    fn check(&self, bytes: &[u8], content_type: &str) -> Result<&'static str, MediaError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !essence.starts_with("image/") {
            return Err(MediaError::UnsupportedType);
        }
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge(self.max_bytes));
        }
        Ok(extension_for(&essence))
    }
}

/// Preferred file extension for an image content type.
fn extension_for(essence: &str) -> &'static str {
    match essence {
        "image/jpeg" => "jpg",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, MediaError> {
        let ext = self.check(&bytes, content_type)?;
        let file_name = format!("{}.{}", uuid::Uuid::now_v7(), ext);

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&file_name), &bytes).await?;
        tracing::info!(file = %file_name, size = bytes.len(), "Stored upload");

        Ok(format!("{}/{}", MEDIA_PREFIX, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalMediaStore {
        LocalMediaStore::new(dir.path().join("uploads"), 16)
    }

    #[tokio::test]
    async fn stores_image_and_returns_media_url() {
        let dir = tempfile::tempdir().unwrap();
        let media = store(&dir);

        let url = media.put(b"\x89PNG".to_vec(), "image/png").await.unwrap();
        assert!(url.starts_with("/media/"));
        assert!(url.ends_with(".png"));

        let file_name = url.trim_start_matches("/media/");
        let written = std::fs::read(dir.path().join("uploads").join(file_name)).unwrap();
        assert_eq!(written, b"\x89PNG");
    }

    #[tokio::test]
    async fn jpeg_uses_jpg_extension() {
        let dir = tempfile::tempdir().unwrap();
        let url = store(&dir)
            .put(vec![0xff, 0xd8], "image/jpeg")
            .await
            .unwrap();
        assert!(url.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn rejects_non_images_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let media = store(&dir);

        let text = media.put(b"hello".to_vec(), "text/plain").await;
        assert!(matches!(text, Err(MediaError::UnsupportedType)));

        let big = media.put(vec![0u8; 17], "image/gif").await;
        assert!(matches!(big, Err(MediaError::TooLarge(16))));

        let empty = media.put(Vec::new(), "image/gif").await;
        assert!(matches!(empty, Err(MediaError::Empty)));
    }
}
