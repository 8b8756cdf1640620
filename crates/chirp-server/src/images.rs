//! On-disk storage for uploaded tweet images and avatars.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;

/// Extensions accepted for uploads (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "png", "jpeg"];

/// URL prefix tweet images are served under.
pub const TWEET_IMAGE_PREFIX: &str = "/tweetImages";

/// URL prefix avatars are served under.
pub const AVATAR_PREFIX: &str = "/images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Tweet,
    Avatar,
}

impl ImageKind {
    fn field_name(self) -> &'static str {
        match self {
            ImageKind::Tweet => "image",
            ImageKind::Avatar => "avatar",
        }
    }
}

/// Validate the extension of an uploaded file name and return it lowercased.
pub fn allowed_extension(file_name: &str) -> Result<String, ApiError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ApiError::Validation(format!(
            "not a valid file: only {} images are accepted",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, file_name: &str) -> Result<PathBuf, ApiError> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(base.join(file_name)),
        _ => Err(ApiError::Validation("Path traversal detected".to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    tweet_dir: PathBuf,
    avatar_dir: PathBuf,
    max_size: usize,
}

impl ImageStore {
    pub async fn new(
        tweet_dir: PathBuf,
        avatar_dir: PathBuf,
        max_size: usize,
    ) -> Result<Self, ApiError> {
        for dir in [&tweet_dir, &avatar_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                ApiError::Internal(format!(
                    "Failed to create image directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(
            tweets = %tweet_dir.display(),
            avatars = %avatar_dir.display(),
            "Image store initialized"
        );

        Ok(Self {
            tweet_dir,
            avatar_dir,
            max_size,
        })
    }

    pub fn dir(&self, kind: ImageKind) -> &Path {
        match kind {
            ImageKind::Tweet => &self.tweet_dir,
            ImageKind::Avatar => &self.avatar_dir,
        }
    }

    /// Store an uploaded image under a generated name and return that name.
    pub async fn store(
        &self,
        kind: ImageKind,
        original_name: &str,
        data: &[u8],
    ) -> Result<String, ApiError> {
        let ext = allowed_extension(original_name)?;
        if data.is_empty() {
            return Err(ApiError::Validation("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ApiError::UploadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let file_name = format!("{}-{}.{}", kind.field_name(), Uuid::new_v4(), ext);
        let path = ensure_within(self.dir(kind), &file_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ApiError::Internal(format!("Failed to write image {file_name}: {e}"))
        })?;

        debug!(file = %file_name, size = data.len(), "Stored image");
        Ok(file_name)
    }

    /// Remove a previously stored image.
    pub async fn delete(&self, kind: ImageKind, file_name: &str) -> Result<(), ApiError> {
        let path = ensure_within(self.dir(kind), file_name)?;
        fs::remove_file(&path).await.map_err(|e| {
            ApiError::Internal(format!("Failed to delete image {file_name}: {e}"))
        })?;

        debug!(file = %file_name, "Deleted image");
        Ok(())
    }
}

/// Value stored on a tweet for an uploaded image.
pub fn tweet_image_path(file_name: &str) -> String {
    format!("{TWEET_IMAGE_PREFIX}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (ImageStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(
            dir.path().join("tweetImages"),
            dir.path().join("images"),
            1024,
        )
        .await
        .unwrap();
        (store, dir)
    }

    #[test]
    fn test_allowed_extensions() {
        assert_eq!(allowed_extension("cat.JPG").unwrap(), "jpg");
        assert_eq!(allowed_extension("cat.jpeg").unwrap(), "jpeg");
        assert_eq!(allowed_extension("cat.png").unwrap(), "png");
        assert!(allowed_extension("cat.gif").is_err());
        assert!(allowed_extension("cat.jpgx").is_err());
        assert!(allowed_extension("png").is_err());
    }

    #[tokio::test]
    async fn test_store_and_delete() {
        let (store, _dir) = test_store().await;

        let name = store.store(ImageKind::Tweet, "photo.png", b"png-bytes").await.unwrap();
        assert!(name.starts_with("image-"));
        assert!(name.ends_with(".png"));

        let path = store.dir(ImageKind::Tweet).join(&name);
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        store.delete(ImageKind::Tweet, &name).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_avatar_goes_to_avatar_dir() {
        let (store, _dir) = test_store().await;
        let name = store.store(ImageKind::Avatar, "me.jpg", b"jpg").await.unwrap();
        assert!(name.starts_with("avatar-"));
        assert!(store.dir(ImageKind::Avatar).join(&name).exists());
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.store(ImageKind::Tweet, "x.exe", b"data").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            store.store(ImageKind::Tweet, "x.png", b"").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            store.store(ImageKind::Tweet, "x.png", &[0u8; 2048]).await,
            Err(ApiError::UploadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_rejects_traversal() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.delete(ImageKind::Avatar, "../chirp.db").await,
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_tweet_image_path() {
        assert_eq!(tweet_image_path("image-1.png"), "/tweetImages/image-1.png");
    }
}
