use std::io;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::domain::ObjectKey;

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<u64, BlobStoreError>;

    async fn put_stream(
        &self,
        key: &ObjectKey,
        stream: BoxStream<'_, Result<Bytes, io::Error>>,
    ) -> Result<u64, BlobStoreError>;

    async fn get(&self, key: &ObjectKey) -> Result<Bytes, BlobStoreError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), BlobStoreError>;

    async fn exists(&self, key: &ObjectKey) -> Result<bool, BlobStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("misconfigured store: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
