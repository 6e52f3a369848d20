use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::application::ports::{DeleteOutcome, JobRepository, RepositoryError};
use crate::domain::{
    ArtifactId, ArtifactType, FileId, FileStatus, Job, JobArtifact, JobEvent, JobFile, JobId,
    JobStatus, NewArtifact,
};

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, Job>,
    files: Vec<JobFile>,
    artifacts: Vec<JobArtifact>,
    events: Vec<JobEvent>,
}

/// Process-local record store with the same conditional-update semantics as Postgres.
#[derive(Default)]
pub struct InMemoryJobRepository {
    state: RwLock<State>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create_job(&self, job: &Job, files: &[JobFile]) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "job {} already exists",
                job.id
            )));
        }
        if let Some(file) = files.iter().find(|f| f.job_id != job.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "file {} does not belong to job {}",
                file.id, job.id
            )));
        }
        state.jobs.insert(job.id, job.clone());
        state.files.extend(files.iter().cloned());
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn list_files(&self, job_id: JobId) -> Result<Vec<JobFile>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .files
            .iter()
            .filter(|f| f.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn get_file(&self, id: FileId) -> Result<Option<JobFile>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.files.iter().find(|f| f.id == id).cloned())
    }

    async fn transition_status(
        &self,
        id: JobId,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.jobs.get_mut(&id) {
            Some(job) if from.contains(&job.status) => {
                let now = Utc::now();
                job.status = to;
                job.updated_at = now;
                if to == JobStatus::Completed {
                    job.completed_at = Some(now);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn advance_file_status(
        &self,
        id: FileId,
        from: &[FileStatus],
        to: FileStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.files.iter_mut().find(|f| f.id == id) {
            Some(file) if from.contains(&file.status) => {
                file.status = to;
                file.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_artifacts(
        &self,
        artifacts: &[NewArtifact],
    ) -> Result<Vec<JobArtifact>, RepositoryError> {
        let mut state = self.state.write().await;

        for artifact in artifacts {
            if !state
                .files
                .iter()
                .any(|f| f.id == artifact.job_file_id && f.job_id == artifact.job_id)
            {
                return Err(RepositoryError::NotFound(format!(
                    "file {} of job {}",
                    artifact.job_file_id, artifact.job_id
                )));
            }
        }

        let mut staged: Vec<JobArtifact> = Vec::new();
        let mut recorded = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let existing = state.artifacts.iter().chain(staged.iter());
            if let Some(same) = existing.clone().find(|a| artifact.matches(a)) {
                recorded.push(same.clone());
                continue;
            }
            let version = existing
                .filter(|a| artifact.same_series(a))
                .map(|a| a.version)
                .max()
                .map_or(1, |v| v + 1);
            let row = JobArtifact {
                id: ArtifactId::new(),
                job_id: artifact.job_id,
                job_file_id: artifact.job_file_id,
                artifact_type: artifact.artifact_type,
                language_code: artifact.language_code.clone(),
                object_key: artifact.object_key.clone(),
                version,
                created_at: Utc::now(),
            };
            staged.push(row.clone());
            recorded.push(row);
        }

        state.artifacts.extend(staged);
        Ok(recorded)
    }

    async fn list_artifacts(&self, job_id: JobId) -> Result<Vec<JobArtifact>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .artifacts
            .iter()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn latest_artifact(
        &self,
        file_id: FileId,
        artifact_type: ArtifactType,
        language_code: Option<&str>,
    ) -> Result<Option<JobArtifact>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .artifacts
            .iter()
            .filter(|a| {
                a.job_file_id == file_id
                    && a.artifact_type == artifact_type
                    && a.language_code.as_deref() == language_code
            })
            .max_by_key(|a| a.version)
            .cloned())
    }

    async fn translated_pairs(
        &self,
        job_id: JobId,
    ) -> Result<HashSet<(FileId, String)>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .artifacts
            .iter()
            .filter(|a| a.job_id == job_id && a.artifact_type == ArtifactType::Translation)
            .filter_map(|a| a.language_code.clone().map(|lang| (a.job_file_id, lang)))
            .collect())
    }

    async fn append_event(&self, event: &JobEvent) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.jobs.contains_key(&event.job_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "job {} does not exist",
                event.job_id
            )));
        }
        state.events.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, job_id: JobId) -> Result<Vec<JobEvent>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn delete_job(
        &self,
        id: JobId,
        blocked: &[JobStatus],
    ) -> Result<DeleteOutcome, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(job) = state.jobs.get(&id) else {
            return Ok(DeleteOutcome::NotFound);
        };
        if blocked.contains(&job.status) {
            return Ok(DeleteOutcome::Rejected(job.status));
        }

        let mut object_keys = Vec::new();
        for key in state
            .files
            .iter()
            .filter(|f| f.job_id == id)
            .map(|f| &f.object_key)
            .chain(
                state
                    .artifacts
                    .iter()
                    .filter(|a| a.job_id == id)
                    .map(|a| &a.object_key),
            )
        {
            if !object_keys.contains(key) {
                object_keys.push(key.clone());
            }
        }

        state.jobs.remove(&id);
        state.files.retain(|f| f.job_id != id);
        state.artifacts.retain(|a| a.job_id != id);
        state.events.retain(|e| e.job_id != id);

        Ok(DeleteOutcome::Deleted { object_keys })
    }
}
