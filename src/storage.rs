//! Blob storage for uploaded documents.
//!
//! The pipeline only ever sees the [`FileStorage`] trait; the local
//! implementation stores content-addressed files in a two-level directory
//! structure based on hash prefix for filesystem efficiency:
//! `{root}/{hash[0..2]}/{sanitized_basename}-{hash[0..8]}.{extension}`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored blob's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Key to retrieve the blob with, relative to the storage root.
    pub stored_filename: String,
    pub size_bytes: u64,
}

/// Blob storage the orchestrator and workers read uploads from.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Fetch a blob by its storage key.
    async fn get_file(&self, stored_filename: &str) -> Result<Vec<u8>, StorageError>;

    /// Store a blob, returning the key it can be fetched with.
    async fn put_file(
        &self,
        original_filename: &str,
        mime_type: &str,
        content: &[u8],
    ) -> Result<StoredFile, StorageError>;

    /// Remove a blob. Missing blobs are not an error.
    async fn delete_file(&self, stored_filename: &str) -> Result<(), StorageError>;
}

/// Content-addressed storage on the local filesystem.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, stored_filename: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(stored_filename);
        let escapes_root = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes_root {
            return Err(StorageError::InvalidKey(stored_filename.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn get_file(&self, stored_filename: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(stored_filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(stored_filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put_file(
        &self,
        original_filename: &str,
        mime_type: &str,
        content: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let hash = compute_hash(content);
        let basename = Path::new(original_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let key = format!(
            "{}/{}-{}.{}",
            &hash[..2],
            sanitize_filename(basename),
            &hash[..8],
            mime_to_extension(mime_type)
        );

        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        Ok(StoredFile {
            stored_filename: key,
            size_bytes: content.len() as u64,
        })
    }

    async fn delete_file(&self, stored_filename: &str) -> Result<(), StorageError> {
        let path = self.resolve(stored_filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// SHA-256 of the content, hex-encoded.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Make a filename safe for storage paths.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('_');
    if trimmed.len() > 100 {
        trimmed.chars().take(100).collect()
    } else if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Map MIME type to file extension.
pub fn mime_to_extension(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/markdown" => "md",
        "text/csv" => "csv",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/tiff" => "tiff",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let stored = storage
            .put_file("report.pdf", "application/pdf", b"%PDF-1.4 content")
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 16);
        assert!(stored.stored_filename.ends_with(".pdf"));

        let bytes = storage.get_file(&stored.stored_filename).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 content");
    }

    #[tokio::test]
    async fn test_layout_uses_hash_prefix_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let stored = storage
            .put_file("scan.png", "image/png", b"pngbytes")
            .await
            .unwrap();
        let hash = compute_hash(b"pngbytes");
        assert!(stored.stored_filename.starts_with(&format!("{}/", &hash[..2])));
        assert!(stored.stored_filename.contains(&hash[..8]));
        assert!(dir.path().join(&stored.stored_filename).exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.get_file("ab/missing-12345678.pdf").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.get_file("../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage
            .put_file("note.txt", "text/plain", b"hello")
            .await
            .unwrap();
        storage.delete_file(&stored.stored_filename).await.unwrap();
        storage.delete_file(&stored.stored_filename).await.unwrap();
        assert!(!dir.path().join(&stored.stored_filename).exists());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("___"), "document");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
    }
}
