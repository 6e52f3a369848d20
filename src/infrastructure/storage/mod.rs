mod object_blob_store;
mod s3_store;
mod store_factory;

pub use object_blob_store::ObjectBlobStore;
pub use s3_store::S3Config;
pub use store_factory::BlobStoreFactory;
