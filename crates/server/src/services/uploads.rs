//! Image uploads for products and profile pictures.
//!
//! Files are stored flat in the configured directory under a generated
//! `<uuid>.<ext>` name. That name is the only reference kept in the database,
//! and the directory is served read-only under `/uploads`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::Multipart;
use thiserror::Error;
use uuid::Uuid;

use crate::config::UploadConfig;

/// Accepted image extensions, lower-case.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Upload failures.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported file type, expected one of: png, jpg, jpeg, gif, webp")]
    UnsupportedType,

    #[error("file exceeds the {max} byte limit")]
    TooLarge { max: usize },

    #[error("{0} file is required")]
    MissingFile(&'static str),

    #[error("invalid multipart body: {0}")]
    Multipart(String),

    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// A file part taken from a multipart body.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Text fields plus the one file field of a multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<FilePart>,
}

impl MultipartForm {
    /// Read every part. Only `file_field` is treated as a file; an empty
    /// file part (no file chosen) is ignored.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Multipart` for an unreadable body and
    /// `UploadError::TooLarge` for an oversized file.
    pub async fn read(
        mut multipart: Multipart,
        file_field: &str,
        max_bytes: usize,
    ) -> Result<Self, UploadError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Multipart(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == file_field {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Multipart(e.body_text()))?;
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > max_bytes {
                    return Err(UploadError::TooLarge { max: max_bytes });
                }
                form.file = Some(FilePart { file_name, bytes });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Multipart(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// A trimmed, non-empty text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Writes and removes files in the upload directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    #[must_use]
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_bytes: config.max_bytes,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store a file part and return its generated name.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` for a disallowed extension,
    /// `UploadError::TooLarge` over the limit, or `UploadError::Io`.
    pub async fn save(&self, file: &FilePart) -> Result<String, UploadError> {
        let extension = allowed_extension(&file.file_name)?;
        if file.bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                max: self.max_bytes,
            });
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let stored = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(self.dir.join(&stored), &file.bytes).await?;

        tracing::debug!(stored = %stored, bytes = file.bytes.len(), "upload stored");
        Ok(stored)
    }

    /// Delete a previously stored file. Failures are logged, not returned.
    pub async fn remove(&self, stored: &str) {
        if Path::new(stored).file_name().and_then(|n| n.to_str()) != Some(stored) {
            tracing::warn!(stored = %stored, "refusing to remove upload outside the upload directory");
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.dir.join(stored)).await {
            tracing::warn!(stored = %stored, error = %e, "failed to remove replaced upload");
        }
    }
}

/// The lower-cased extension of `file_name`, if it is an accepted image type.
///
/// # Errors
///
/// Returns `UploadError::UnsupportedType` otherwise.
pub fn allowed_extension(file_name: &str) -> Result<&'static str, UploadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or(UploadError::UnsupportedType)?;

    ALLOWED_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == extension)
        .copied()
        .ok_or(UploadError::UnsupportedType)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(max_bytes: usize) -> UploadStore {
        UploadStore::new(&UploadConfig {
            dir: std::env::temp_dir().join(format!("ventas-uploads-{}", Uuid::new_v4())),
            max_bytes,
        })
    }

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("photo.PNG").unwrap(), "png");
        assert_eq!(allowed_extension("a.b.jpeg").unwrap(), "jpeg");
        assert!(matches!(
            allowed_extension("script.svg"),
            Err(UploadError::UnsupportedType)
        ));
        assert!(allowed_extension("no-extension").is_err());
        assert!(allowed_extension("").is_err());
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let store = store(1024);
        let file = FilePart {
            file_name: "avatar.webp".to_string(),
            bytes: Bytes::from_static(b"RIFF....WEBP"),
        };

        let stored = store.save(&file).await.unwrap();
        assert!(stored.ends_with(".webp"));
        let path = store.dir().join(&stored);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"RIFF....WEBP");

        store.remove(&stored).await;
        assert!(!path.exists());
        let _ = tokio::fs::remove_dir_all(store.dir()).await;
    }

    #[tokio::test]
    async fn test_save_rejects_oversized_file() {
        let store = store(4);
        let file = FilePart {
            file_name: "big.png".to_string(),
            bytes: Bytes::from_static(b"12345"),
        };
        assert!(matches!(
            store.save(&file).await,
            Err(UploadError::TooLarge { max: 4 })
        ));
    }
}
