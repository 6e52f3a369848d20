use std::sync::Arc;

use object_store::aws::AmazonS3Builder;

use crate::application::ports::BlobStoreError;

use super::ObjectBlobStore;

/// Connection details for an S3-compatible bucket (AWS or MinIO).
#[derive(Debug, Clone)]
pub struct S3Config<'a> {
    pub bucket: &'a str,
    pub region: &'a str,
    pub endpoint: Option<&'a str>,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub allow_http: bool,
}

impl ObjectBlobStore {
    pub fn s3(config: &S3Config<'_>) -> Result<Self, BlobStoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(config.bucket)
            .with_region(config.region)
            .with_access_key_id(config.access_key_id)
            .with_secret_access_key(config.secret_access_key)
            .with_allow_http(config.allow_http);

        if let Some(endpoint) = config.endpoint {
            // MinIO serves buckets as path segments.
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| BlobStoreError::Configuration(e.to_string()))?;

        Ok(Self::new(Arc::new(store)))
    }
}
