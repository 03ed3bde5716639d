//! Blob storage for uploaded document bytes
//!
//! The ingestion pipeline only talks to the [`BlobStore`] trait; the
//! default implementation keeps files in a local directory.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Abstract store for raw uploaded bytes
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh key derived from the name hint
    async fn put(&self, bytes: &[u8], name_hint: &str) -> Result<String>;

    /// Fetch the bytes stored under a key
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove a blob. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Local-filesystem blob store
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // keys are generated by put(); reject anything path-like
        if key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(Error::Blob(format!("invalid blob key: {}", key)));
        }
        Ok(self.root.join(key))
    }

    /// Keep the original name readable inside the key while stripping
    /// anything the filesystem could object to
    fn sanitize(name: &str) -> String {
        let cleaned: String = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "upload".to_string()
        } else {
            cleaned
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bytes: &[u8], name_hint: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let key = format!("{}-{}", Uuid::new_v4(), Self::sanitize(name_hint));
        let path = self.root.join(&key);
        debug!("Storing {} bytes at {:?}", bytes.len(), path);
        tokio::fs::write(&path, bytes).await?;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path());

        let key = store.put(b"hello world", "guide.pdf").await.unwrap();
        assert!(key.ends_with("guide.pdf"));

        let bytes = store.get(&key).await.unwrap();
        assert_eq!(bytes, b"hello world");

        store.delete(&key).await.unwrap();
        assert!(matches!(store.get(&key).await, Err(Error::NotFound(_))));

        // deleting again is a no-op
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_are_unique_per_upload() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path());

        let a = store.put(b"one", "same.pdf").await.unwrap();
        let b = store.put(b"two", "same.pdf").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.get(&a).await.unwrap(), b"one");
        assert_eq!(store.get(&b).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_name_hint_is_sanitized() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path());

        let key = store.put(b"x", "../../etc/pass wd.pdf").await.unwrap();
        assert!(!key.contains(".."));
        assert!(!key.contains('/'));
        assert!(!key.contains(' '));
        assert_eq!(store.get(&key).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_path_like_keys_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = LocalBlobStore::new(tmp.path());

        assert!(matches!(
            store.get("../outside").await,
            Err(Error::Blob(_))
        ));
    }
}
