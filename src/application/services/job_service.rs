use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::ports::{
    BlobStore, BlobStoreError, DeleteOutcome, EventBus, EventBusError, JobRepository,
    RepositoryError, StreamMessage,
};
use crate::domain::{
    EventKind, Job, JobArtifact, JobEvent, JobFile, JobId, JobSettings, JobStatus, MediaType,
    ObjectKey, Priority, StreamName,
};

use super::retry::{RetryPolicy, with_retry};

#[derive(Debug, Clone)]
pub struct NewJobFile {
    pub filename: String,
    pub object_key: ObjectKey,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Derived from `mime_type` when absent.
    pub media_type: Option<MediaType>,
}

#[derive(Debug, Clone)]
pub struct CreateJob {
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub priority: Priority,
    pub settings: JobSettings,
    pub files: Vec<NewJobFile>,
}

#[derive(Debug, Clone)]
pub struct JobDetails {
    pub job: Job,
    pub files: Vec<JobFile>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub object_key: ObjectKey,
    pub size_bytes: u64,
    pub media_type: Option<MediaType>,
}

/// Client-facing job lifecycle: submission, start, inspection, review and deletion.
pub struct JobService {
    repository: Arc<dyn JobRepository>,
    bus: Arc<dyn EventBus>,
    store: Arc<dyn BlobStore>,
    retry: RetryPolicy,
}

impl JobService {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        bus: Arc<dyn EventBus>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            repository,
            bus,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[instrument(skip(self, stream), fields(filename = %filename))]
    pub async fn upload(
        &self,
        filename: &str,
        mime_type: &str,
        stream: BoxStream<'_, Result<Bytes, io::Error>>,
    ) -> Result<UploadedFile, JobServiceError> {
        let object_key = ObjectKey::upload(Uuid::new_v4(), filename);
        let size_bytes = self.store.put_stream(&object_key, stream).await?;
        info!(object_key = %object_key, size_bytes, "Upload stored");
        Ok(UploadedFile {
            object_key,
            size_bytes,
            media_type: MediaType::from_mime(mime_type),
        })
    }

    pub async fn create_job(&self, request: CreateJob) -> Result<JobDetails, JobServiceError> {
        let source_language = request.source_language.trim().to_string();
        if source_language.is_empty() {
            return Err(JobServiceError::InvalidRequest(
                "source_language is required".to_string(),
            ));
        }

        let job = Job::new(
            source_language,
            request.target_languages,
            request.priority,
            request.settings,
        );
        if job.target_languages.is_empty() {
            return Err(JobServiceError::InvalidRequest(
                "at least one target language is required".to_string(),
            ));
        }

        let mut files = Vec::with_capacity(request.files.len());
        for file in request.files {
            let media_type = file
                .media_type
                .or_else(|| MediaType::from_mime(&file.mime_type))
                .ok_or_else(|| {
                    JobServiceError::InvalidRequest(format!(
                        "unsupported media type '{}' for {}",
                        file.mime_type, file.filename
                    ))
                })?;
            files.push(JobFile::new(
                job.id,
                file.filename,
                file.object_key,
                file.mime_type,
                file.size_bytes,
                media_type,
            ));
        }

        self.repository.create_job(&job, &files).await?;
        self.repository
            .append_event(
                &JobEvent::new(job.id, EventKind::JobCreated, "Job created")
                    .with_meta(json!({"files": files.len()})),
            )
            .await?;

        info!(job_id = %job.id, files = files.len(), "Job created");
        Ok(JobDetails { job, files })
    }

    /// Queues the job and hands it to the orchestrator. Starting a job that
    /// is already queued republishes the trigger.
    pub async fn start_job(&self, id: JobId) -> Result<Job, JobServiceError> {
        let job = self.load(id).await?;
        let files = self.repository.list_files(id).await?;
        if files.is_empty() {
            return Err(JobServiceError::InvalidRequest(
                "job has no files".to_string(),
            ));
        }

        let queued = self
            .repository
            .transition_status(id, &[JobStatus::Created], JobStatus::Queued)
            .await?;
        if !queued && job.status != JobStatus::Queued {
            return Err(JobServiceError::Conflict(format!(
                "job {} is {}",
                id, job.status
            )));
        }

        if queued {
            self.repository
                .append_event(&JobEvent::new(id, EventKind::JobStarted, "Job started"))
                .await?;
        }

        let trigger = StreamMessage::new(EventKind::JobCreated, id)
            .with("priority", job.priority.as_str())
            .with("source_language", job.source_language.as_str())
            .with("target_languages", json!(job.target_languages));
        with_retry(&self.retry, "publish job.created", || {
            self.bus.publish(StreamName::Events, &trigger)
        })
        .await?;

        info!(job_id = %id, "Job queued");
        self.load(id).await
    }

    pub async fn get_job(&self, id: JobId) -> Result<JobDetails, JobServiceError> {
        let job = self.load(id).await?;
        let files = self.repository.list_files(id).await?;
        Ok(JobDetails { job, files })
    }

    pub async fn list_events(&self, id: JobId) -> Result<Vec<JobEvent>, JobServiceError> {
        self.load(id).await?;
        Ok(self.repository.list_events(id).await?)
    }

    pub async fn list_artifacts(&self, id: JobId) -> Result<Vec<JobArtifact>, JobServiceError> {
        self.load(id).await?;
        Ok(self.repository.list_artifacts(id).await?)
    }

    pub async fn complete_review(&self, id: JobId) -> Result<(), JobServiceError> {
        let job = self.load(id).await?;
        if job.status != JobStatus::Review {
            return Err(JobServiceError::Conflict(format!(
                "job {} is {}, not in review",
                id, job.status
            )));
        }

        let message = StreamMessage::new(EventKind::ReviewCompleted, id);
        with_retry(&self.retry, "publish review.completed", || {
            self.bus.publish(StreamName::Events, &message)
        })
        .await?;
        Ok(())
    }

    /// Removes the job and everything it owns. Refused while workers may
    /// still be writing results for it.
    pub async fn delete_job(&self, id: JobId) -> Result<(), JobServiceError> {
        match self
            .repository
            .delete_job(id, &JobStatus::MID_PIPELINE)
            .await?
        {
            DeleteOutcome::NotFound => Err(JobServiceError::NotFound(id)),
            DeleteOutcome::Rejected(status) => Err(JobServiceError::Conflict(format!(
                "job {} is {} and cannot be deleted",
                id, status
            ))),
            DeleteOutcome::Deleted { object_keys } => {
                for key in &object_keys {
                    if let Err(e) = self.store.delete(key).await {
                        if !matches!(e, BlobStoreError::NotFound(_)) {
                            warn!(error = %e, object_key = %key, "Failed to delete blob");
                        }
                    }
                }
                info!(job_id = %id, blobs = object_keys.len(), "Job deleted");
                Ok(())
            }
        }
    }

    async fn load(&self, id: JobId) -> Result<Job, JobServiceError> {
        self.repository
            .get_job(id)
            .await?
            .ok_or(JobServiceError::NotFound(id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("event bus: {0}")]
    Bus(#[from] EventBusError),
    #[error("storage: {0}")]
    Storage(#[from] BlobStoreError),
}

impl JobServiceError {
    pub fn is_transient(&self) -> bool {
        match self {
            JobServiceError::Repository(e) => e.is_transient(),
            JobServiceError::Bus(_) => true,
            _ => false,
        }
    }
}
