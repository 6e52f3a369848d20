use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{FileId, JobId, NewArtifact, ObjectKey, Stage};

use super::{BlobStoreError, RepositoryError, StreamMessage, TranslationError};

/// Identifies one issued work request. Redeliveries share it, reruns do not.
pub const REQUEST_ID_FIELD: &str = "request_id";

/// A unit of work pulled off a stage stream.
#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub job_id: JobId,
    /// Names this run's outputs so a rerun never overwrites an earlier one.
    pub request_id: String,
    pub file_id: Option<FileId>,
    pub object_key: Option<ObjectKey>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    /// The raw envelope, for stage-specific fields.
    pub message: StreamMessage,
}

/// What a processor produced. `result` keys are merged into the completion event.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub artifacts: Vec<NewArtifact>,
    pub result: BTreeMap<String, Value>,
}

impl StageOutput {
    pub fn with_artifact(mut self, artifact: NewArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_result(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.result.insert(key.into(), value.into());
        self
    }
}

/// Content-specific logic for one pipeline stage.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    fn stage(&self) -> Stage;

    async fn process(&self, request: &WorkRequest) -> Result<StageOutput, StageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid work request: {0}")]
    InvalidRequest(String),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("processing failed: {0}")]
    Processing(String),
    /// The request may succeed on redelivery; nothing is published.
    #[error("transient failure: {0}")]
    Transient(String),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Storage(#[from] BlobStoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl StageError {
    pub fn is_transient(&self) -> bool {
        match self {
            StageError::Transient(_) => true,
            StageError::Repository(e) => e.is_transient(),
            StageError::Storage(BlobStoreError::Io(_)) => true,
            _ => false,
        }
    }
}
