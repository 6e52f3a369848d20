use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{DeleteOutcome, JobRepository, RepositoryError};
use crate::domain::{
    ArtifactId, ArtifactType, FileId, FileStatus, Job, JobArtifact, JobEvent, JobFile, JobId,
    JobStatus, NewArtifact, ObjectKey,
};

use super::rows::{ArtifactRow, EventRow, FileRow, JobRow, collect, query_error};

const JOB_COLUMNS: &str = "id, status, priority, source_language, target_languages, settings, \
     created_at, updated_at, completed_at";
const FILE_COLUMNS: &str = "id, job_id, filename, object_key, mime_type, size_bytes, media_type, \
     status, created_at, updated_at";
const ARTIFACT_COLUMNS: &str =
    "id, job_id, job_file_id, artifact_type, language_code, object_key, version, created_at";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_statuses(statuses: &[JobStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl JobRepository for PgJobRepository {
    #[instrument(skip(self, job, files), fields(job_id = %job.id, files = files.len()))]
    async fn create_job(&self, job: &Job, files: &[JobFile]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, status, priority, source_language, target_languages, settings,
                              created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.status.as_str())
        .bind(job.priority.as_str())
        .bind(&job.source_language)
        .bind(&job.target_languages)
        .bind(job.settings.to_value())
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        for file in files {
            sqlx::query(
                r#"
                INSERT INTO job_files (id, job_id, filename, object_key, mime_type, size_bytes,
                                       media_type, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(file.id.as_uuid())
            .bind(file.job_id.as_uuid())
            .bind(&file.filename)
            .bind(file.object_key.as_str())
            .bind(&file.mime_type)
            .bind(file.size_bytes as i64)
            .bind(file.media_type.as_str())
            .bind(file.status.as_str())
            .bind(file.created_at)
            .bind(file.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        tx.commit().await.map_err(query_error)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

        row.map(Job::try_from).transpose()
    }

    #[instrument(skip(self), fields(status = %status))]
    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = $1 ORDER BY created_at DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        collect(rows)
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn list_files(&self, job_id: JobId) -> Result<Vec<JobFile>, RepositoryError> {
        let rows: Vec<FileRow> = sqlx::query_as(&format!(
            "SELECT {FILE_COLUMNS} FROM job_files WHERE job_id = $1 ORDER BY created_at, id"
        ))
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        collect(rows)
    }

    #[instrument(skip(self), fields(file_id = %id))]
    async fn get_file(&self, id: FileId) -> Result<Option<JobFile>, RepositoryError> {
        let row: Option<FileRow> =
            sqlx::query_as(&format!("SELECT {FILE_COLUMNS} FROM job_files WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

        row.map(JobFile::try_from).transpose()
    }

    #[instrument(skip(self, from), fields(job_id = %id, to = %to))]
    async fn transition_status(
        &self,
        id: JobId,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                updated_at = $2,
                completed_at = CASE WHEN $1 = 'COMPLETED' THEN $2 ELSE completed_at END
            WHERE id = $3 AND status = ANY($4)
            "#,
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id.as_uuid())
        .bind(job_statuses(from))
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, from), fields(file_id = %id, to = %to))]
    async fn advance_file_status(
        &self,
        id: FileId,
        from: &[FileStatus],
        to: FileStatus,
    ) -> Result<bool, RepositoryError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            "UPDATE job_files SET status = $1, updated_at = $2 WHERE id = $3 AND status = ANY($4)",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id.as_uuid())
        .bind(from)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, artifacts), fields(count = artifacts.len()))]
    async fn record_artifacts(
        &self,
        artifacts: &[NewArtifact],
    ) -> Result<Vec<JobArtifact>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;
        let mut recorded = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            // Serializes version assignment per file.
            let locked: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM job_files WHERE id = $1 AND job_id = $2 FOR UPDATE")
                    .bind(artifact.job_file_id.as_uuid())
                    .bind(artifact.job_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(query_error)?;
            if locked.is_none() {
                return Err(RepositoryError::NotFound(format!(
                    "file {} of job {}",
                    artifact.job_file_id, artifact.job_id
                )));
            }

            let series: Vec<ArtifactRow> = sqlx::query_as(&format!(
                "SELECT {ARTIFACT_COLUMNS} FROM job_artifacts \
                 WHERE job_file_id = $1 AND artifact_type = $2 \
                 AND language_code IS NOT DISTINCT FROM $3 \
                 ORDER BY version DESC"
            ))
            .bind(artifact.job_file_id.as_uuid())
            .bind(artifact.artifact_type.as_str())
            .bind(artifact.language_code.as_deref())
            .fetch_all(&mut *tx)
            .await
            .map_err(query_error)?;
            let series: Vec<JobArtifact> = collect(series)?;

            if let Some(existing) = series.iter().find(|a| artifact.matches(a)) {
                recorded.push(existing.clone());
                continue;
            }

            let version = series.first().map_or(1, |latest| latest.version + 1);
            let row: ArtifactRow = sqlx::query_as(&format!(
                "INSERT INTO job_artifacts ({ARTIFACT_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING {ARTIFACT_COLUMNS}"
            ))
            .bind(ArtifactId::new().as_uuid())
            .bind(artifact.job_id.as_uuid())
            .bind(artifact.job_file_id.as_uuid())
            .bind(artifact.artifact_type.as_str())
            .bind(artifact.language_code.as_deref())
            .bind(artifact.object_key.as_str())
            .bind(version)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error)?;
            recorded.push(JobArtifact::try_from(row)?);
        }

        tx.commit().await.map_err(query_error)?;
        Ok(recorded)
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn list_artifacts(&self, job_id: JobId) -> Result<Vec<JobArtifact>, RepositoryError> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM job_artifacts WHERE job_id = $1 \
             ORDER BY created_at, version"
        ))
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        collect(rows)
    }

    #[instrument(skip(self), fields(file_id = %file_id, artifact_type = %artifact_type))]
    async fn latest_artifact(
        &self,
        file_id: FileId,
        artifact_type: ArtifactType,
        language_code: Option<&str>,
    ) -> Result<Option<JobArtifact>, RepositoryError> {
        let row: Option<ArtifactRow> = sqlx::query_as(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM job_artifacts \
             WHERE job_file_id = $1 AND artifact_type = $2 \
             AND language_code IS NOT DISTINCT FROM $3 \
             ORDER BY version DESC LIMIT 1"
        ))
        .bind(file_id.as_uuid())
        .bind(artifact_type.as_str())
        .bind(language_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(JobArtifact::try_from).transpose()
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn translated_pairs(
        &self,
        job_id: JobId,
    ) -> Result<HashSet<(FileId, String)>, RepositoryError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT job_file_id, language_code
            FROM job_artifacts
            WHERE job_id = $1 AND artifact_type = 'translation' AND language_code IS NOT NULL
            "#,
        )
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .map(|(file_id, language)| (FileId::from_uuid(file_id), language))
            .collect())
    }

    #[instrument(skip(self, event), fields(job_id = %event.job_id, event_type = %event.event_type))]
    async fn append_event(&self, event: &JobEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO job_events (id, job_id, event_type, message, meta, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.job_id.as_uuid())
        .bind(&event.event_type)
        .bind(&event.message)
        .bind(&event.meta)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn list_events(&self, job_id: JobId) -> Result<Vec<JobEvent>, RepositoryError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, job_id, event_type, message, meta, created_at
            FROM job_events
            WHERE job_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows.into_iter().map(JobEvent::from).collect())
    }

    #[instrument(skip(self, blocked), fields(job_id = %id))]
    async fn delete_job(
        &self,
        id: JobId,
        blocked: &[JobStatus],
    ) -> Result<DeleteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;

        let status: Option<(String,)> =
            sqlx::query_as("SELECT status FROM jobs WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(query_error)?;

        let Some((status,)) = status else {
            return Ok(DeleteOutcome::NotFound);
        };
        let status = status
            .parse::<JobStatus>()
            .map_err(RepositoryError::QueryFailed)?;
        if blocked.contains(&status) {
            return Ok(DeleteOutcome::Rejected(status));
        }

        let keys: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT object_key FROM job_files WHERE job_id = $1
            UNION
            SELECT object_key FROM job_artifacts WHERE job_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(query_error)?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        tx.commit().await.map_err(query_error)?;

        Ok(DeleteOutcome::Deleted {
            object_keys: keys
                .into_iter()
                .map(|(key,)| ObjectKey::from_raw(key))
                .collect(),
        })
    }
}
