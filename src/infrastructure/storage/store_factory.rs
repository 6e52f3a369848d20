use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::presentation::config::{StorageProviderSetting, StorageSettings};

use super::{ObjectBlobStore, S3Config};

pub struct BlobStoreFactory;

impl BlobStoreFactory {
    pub fn create(settings: &StorageSettings) -> Result<Arc<dyn BlobStore>, BlobStoreError> {
        match settings.provider {
            StorageProviderSetting::Local => {
                let path = PathBuf::from(&settings.local_path);
                let store = ObjectBlobStore::local(path)?;
                Ok(Arc::new(store))
            }
            StorageProviderSetting::S3 => {
                let bucket = settings.s3_bucket.as_deref().ok_or_else(|| {
                    BlobStoreError::Configuration("s3_bucket required".into())
                })?;
                let access_key_id = settings.s3_access_key_id.as_deref().ok_or_else(|| {
                    BlobStoreError::Configuration("s3_access_key_id required".into())
                })?;
                let secret_access_key =
                    settings.s3_secret_access_key.as_deref().ok_or_else(|| {
                        BlobStoreError::Configuration("s3_secret_access_key required".into())
                    })?;
                let store = ObjectBlobStore::s3(&S3Config {
                    bucket,
                    region: &settings.s3_region,
                    endpoint: settings.s3_endpoint.as_deref(),
                    access_key_id,
                    secret_access_key,
                    allow_http: settings.s3_allow_http,
                })?;
                Ok(Arc::new(store))
            }
        }
    }
}
