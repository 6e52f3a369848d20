use std::collections::HashSet;

use crate::domain::{
    ArtifactType, FileId, FileStatus, Job, JobArtifact, JobEvent, JobFile, JobId, JobStatus,
    NewArtifact, ObjectKey,
};
use async_trait::async_trait;

use super::RepositoryError;

/// Outcome of a guarded cascade delete.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// Records are gone; the listed blobs belonged to the job.
    Deleted { object_keys: Vec<ObjectKey> },
    NotFound,
    Rejected(JobStatus),
}

/// Durable record store for jobs, their files, artifacts and audit events.
///
/// Every mutation that drives the pipeline is conditional, so concurrent
/// orchestrators and duplicate deliveries race safely.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts the job and all of its files in one transaction.
    async fn create_job(&self, job: &Job, files: &[JobFile]) -> Result<(), RepositoryError>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError>;

    async fn list_files(&self, job_id: JobId) -> Result<Vec<JobFile>, RepositoryError>;

    async fn get_file(&self, id: FileId) -> Result<Option<JobFile>, RepositoryError>;

    /// Sets `to` only if the job is currently in one of `from`.
    /// Returns whether this call performed the transition.
    async fn transition_status(
        &self,
        id: JobId,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool, RepositoryError>;

    /// Sets `to` only if the file is currently in one of `from`.
    async fn advance_file_status(
        &self,
        id: FileId,
        from: &[FileStatus],
        to: FileStatus,
    ) -> Result<bool, RepositoryError>;

    /// Records a worker's outputs all-or-nothing. Re-recording an identical
    /// object key returns the existing row; anything else gets the next version.
    async fn record_artifacts(
        &self,
        artifacts: &[NewArtifact],
    ) -> Result<Vec<JobArtifact>, RepositoryError>;

    async fn list_artifacts(&self, job_id: JobId) -> Result<Vec<JobArtifact>, RepositoryError>;

    async fn latest_artifact(
        &self,
        file_id: FileId,
        artifact_type: ArtifactType,
        language_code: Option<&str>,
    ) -> Result<Option<JobArtifact>, RepositoryError>;

    /// Distinct (file, language) pairs covered by `translation` artifacts.
    async fn translated_pairs(
        &self,
        job_id: JobId,
    ) -> Result<HashSet<(FileId, String)>, RepositoryError>;

    async fn append_event(&self, event: &JobEvent) -> Result<(), RepositoryError>;

    async fn list_events(&self, job_id: JobId) -> Result<Vec<JobEvent>, RepositoryError>;

    /// Deletes the job with its files, artifacts and events unless its status
    /// is one of `blocked`. The check and the delete are atomic.
    async fn delete_job(
        &self,
        id: JobId,
        blocked: &[JobStatus],
    ) -> Result<DeleteOutcome, RepositoryError>;
}
