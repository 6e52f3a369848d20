use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use object_store::{MultipartUpload, ObjectStore, PutPayload};

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::domain::ObjectKey;

/// [`BlobStore`] over any `object_store` backend.
pub struct ObjectBlobStore {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectBlobStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    /// Stores objects as files under `base_path`, creating it if needed.
    pub fn local(base_path: PathBuf) -> Result<Self, BlobStoreError> {
        std::fs::create_dir_all(&base_path)?;
        let fs = LocalFileSystem::new_with_prefix(base_path)
            .map_err(|e| BlobStoreError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(fs)))
    }
}

fn store_path(key: &ObjectKey) -> StorePath {
    StorePath::from(key.as_str())
}

fn not_found_or(e: object_store::Error, other: fn(String) -> BlobStoreError) -> BlobStoreError {
    match e {
        object_store::Error::NotFound { path, .. } => BlobStoreError::NotFound(path),
        e => other(e.to_string()),
    }
}

#[async_trait::async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<u64, BlobStoreError> {
        let size = data.len() as u64;
        self.inner
            .put(&store_path(key), PutPayload::from(data))
            .await
            .map_err(|e| BlobStoreError::UploadFailed(e.to_string()))?;
        Ok(size)
    }

    async fn put_stream(
        &self,
        key: &ObjectKey,
        mut stream: BoxStream<'_, Result<Bytes, io::Error>>,
    ) -> Result<u64, BlobStoreError> {
        let mut upload = self
            .inner
            .put_multipart(&store_path(key))
            .await
            .map_err(|e| BlobStoreError::UploadFailed(e.to_string()))?;

        let mut total_bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    let _ = upload.abort().await;
                    return Err(BlobStoreError::Io(e));
                }
            };
            total_bytes += bytes.len() as u64;
            if let Err(e) = upload.put_part(PutPayload::from(bytes)).await {
                let _ = upload.abort().await;
                return Err(BlobStoreError::UploadFailed(e.to_string()));
            }
        }

        upload
            .complete()
            .await
            .map_err(|e| BlobStoreError::UploadFailed(e.to_string()))?;

        Ok(total_bytes)
    }

    async fn get(&self, key: &ObjectKey) -> Result<Bytes, BlobStoreError> {
        let result = self
            .inner
            .get(&store_path(key))
            .await
            .map_err(|e| not_found_or(e, BlobStoreError::DownloadFailed))?;

        result
            .bytes()
            .await
            .map_err(|e| BlobStoreError::DownloadFailed(e.to_string()))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), BlobStoreError> {
        self.inner
            .delete(&store_path(key))
            .await
            .map_err(|e| not_found_or(e, BlobStoreError::DeleteFailed))
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, BlobStoreError> {
        match self.inner.head(&store_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(BlobStoreError::DownloadFailed(e.to_string())),
        }
    }
}
