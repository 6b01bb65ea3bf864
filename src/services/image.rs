//! Recipe image storage
//!
//! Recipe images arrive inline as `data:image/<type>;base64,<data>` URIs.
//! They are decoded, checked against the upload limits and written under
//! `<upload.path>/recipes/` with a random file name. Stored paths are kept
//! relative to the upload root so the public prefix can change freely.

use crate::config::UploadConfig;
use anyhow::Context;
use data_encoding::BASE64;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

const RECIPE_IMAGE_DIR: &str = "recipes";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The upload itself is unacceptable (format, type or size)
    #[error("{0}")]
    Invalid(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Decoded image payload
#[derive(Debug, PartialEq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Split and decode a base64 data URI
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, ImageError> {
    let invalid = || ImageError::Invalid("Image must be a base64 data URI".to_string());

    let rest = uri.trim().strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let mime_type = header.strip_suffix(";base64").ok_or_else(invalid)?;
    if mime_type.is_empty() {
        return Err(invalid());
    }

    let data = BASE64
        .decode(payload.trim().as_bytes())
        .map_err(|e| ImageError::Invalid(format!("Invalid base64 image data: {}", e)))?;
    if data.is_empty() {
        return Err(ImageError::Invalid("Image is empty".to_string()));
    }

    Ok(DecodedImage {
        mime_type: mime_type.to_ascii_lowercase(),
        data,
    })
}

pub struct ImageStore {
    config: UploadConfig,
}

impl ImageStore {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validate and store a data URI, returning the path relative to the upload root
    pub async fn save_data_uri(&self, uri: &str) -> Result<String, ImageError> {
        let image = decode_data_uri(uri)?;

        if !self.config.is_type_allowed(&image.mime_type) {
            return Err(ImageError::Invalid(format!(
                "Invalid image type: {}. Allowed types: {}",
                image.mime_type,
                self.config.allowed_types.join(", ")
            )));
        }

        if image.data.len() as u64 > self.config.max_file_size {
            return Err(ImageError::Invalid(format!(
                "Image too large. Maximum size: {} bytes ({} MB)",
                self.config.max_file_size,
                self.config.max_file_size / 1024 / 1024
            )));
        }

        let dir = self.config.path.join(RECIPE_IMAGE_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create image directory {}", dir.display()))?;

        let filename = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            self.config.get_extension(&image.mime_type)
        );
        fs::write(dir.join(&filename), &image.data)
            .await
            .with_context(|| format!("Failed to write image {}", filename))?;

        let relative = format!("{}/{}", RECIPE_IMAGE_DIR, filename);
        tracing::debug!("Stored image {} ({} bytes)", relative, image.data.len());
        Ok(relative)
    }

    /// Delete a stored image. Failures are logged, never returned.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() || Path::new(relative).is_absolute() || relative.contains("..") {
            return;
        }

        let path = self.config.path.join(relative);
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!("Failed to remove image {}: {}", path.display(), e);
        }
    }

    /// Public URL of a stored image
    pub fn url(&self, relative: &str) -> String {
        self.config.public_url(relative)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// 1x1 transparent PNG
    pub(crate) const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn store(dir: &TempDir) -> ImageStore {
        ImageStore::new(UploadConfig {
            path: dir.path().to_path_buf(),
            ..UploadConfig::default()
        })
    }

    #[test]
    fn test_decode_data_uri() {
        let image = decode_data_uri("data:image/PNG;base64,aGVsbG8=").unwrap();

        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, b"hello");
    }

    #[test]
    fn test_decode_rejects_malformed_uris() {
        for uri in [
            "aGVsbG8=",
            "data:image/png,aGVsbG8=",
            "data:;base64,aGVsbG8=",
            "data:image/png;base64,not base64!",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(decode_data_uri(uri), Err(ImageError::Invalid(_))),
                "expected {} to be rejected",
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let relative = store.save_data_uri(PIXEL_PNG).await.unwrap();

        assert!(relative.starts_with("recipes/"));
        assert!(relative.ends_with(".png"));
        assert!(dir.path().join(&relative).exists());
        assert_eq!(store.url(&relative), format!("/media/{}", relative));

        store.remove(&relative).await;
        assert!(!dir.path().join(&relative).exists());
    }

    #[tokio::test]
    async fn test_save_rejects_disallowed_type() {
        let dir = TempDir::new().unwrap();

        let result = store(&dir).save_data_uri("data:text/plain;base64,aGVsbG8=").await;

        assert!(matches!(result, Err(ImageError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_save_rejects_oversized_image() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(UploadConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 4,
            ..UploadConfig::default()
        });

        let result = store.save_data_uri("data:image/png;base64,aGVsbG8=").await;

        assert!(matches!(result, Err(ImageError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_silent() {
        let dir = TempDir::new().unwrap();

        store(&dir).remove("recipes/missing.png").await;
        store(&dir).remove("../outside.png").await;
    }
}
