//! Blob Store Adapter (spec §4.2): `put`/`get` over an object store, with
//! the `staging/`, `original/`, `processed/` key discipline enforced by
//! `keys`.

pub mod keys;

use async_trait::async_trait;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Port for blob storage. A production adapter (`StorageClient`, backed by
/// `object_store`) and a test adapter (`StorageClient::in_memory()`) both
/// implement it, mirroring the trait-per-capability pattern used for the
/// Metadata Store and Queue adapters.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, returning a stable URL. Idempotent: two
    /// puts of identical bytes under the same key return the same URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Read the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Cheap reachability probe for `/health` (spec §6): a missing key is
    /// a healthy "reachable" answer, only a transport-level error is not.
    async fn health_check(&self) -> Result<()>;
}

/// Production blob store, wrapping any `object_store` backend (S3, GCS,
/// local filesystem, or in-memory for tests).
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String) -> Self {
        Self { store, bucket }
    }

    /// In-memory backend for tests and local development.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            bucket: "imagegate-local".to_string(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("blob://{}/{}", self.bucket, key)
    }

    /// Check if key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for StorageClient {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let path = StoragePath::from(key);
        let size = bytes.len();

        self.store
            .put(&path, bytes.into())
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        let url = self.url_for(key);
        tracing::info!(key, size, content_type, url, "put to blob store");

        Ok(url)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);

        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(key, size = bytes.len(), "get from blob store");

        Ok(bytes.to_vec())
    }

    async fn health_check(&self) -> Result<()> {
        self.exists("health-check").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let client = StorageClient::in_memory();
        let url = client
            .put("original/job1_1700000000.jpg", b"hello".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert!(url.starts_with("blob://imagegate-local/"));

        let bytes = client.get("original/job1_1700000000.jpg").await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_put_is_idempotent_on_identical_key_and_bytes() {
        let client = StorageClient::in_memory();
        let key = "processed/job1_1700000000.jpg";

        let url1 = client.put(key, b"same".to_vec(), "image/jpeg").await.unwrap();
        let url2 = client.put(key, b"same".to_vec(), "image/jpeg").await.unwrap();

        assert_eq!(url1, url2);
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let client = StorageClient::in_memory();
        let err = client.get("original/nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_exists() {
        let client = StorageClient::in_memory();
        assert!(!client.exists("original/missing").await.unwrap());

        client
            .put("original/present", b"x".to_vec(), "image/png")
            .await
            .unwrap();
        assert!(client.exists("original/present").await.unwrap());
    }
}
