use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::application::ports::RepositoryError;
use crate::domain::{
    ArtifactId, ArtifactType, EventId, FileId, FileStatus, Job, JobArtifact, JobEvent, JobFile,
    JobId, JobSettings, JobStatus, MediaType, ObjectKey, Priority,
};

#[derive(sqlx::FromRow)]
pub(super) struct JobRow {
    pub id: Uuid,
    pub status: String,
    pub priority: String,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = RepositoryError;

    fn try_from(r: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: JobId::from_uuid(r.id),
            status: r
                .status
                .parse::<JobStatus>()
                .map_err(RepositoryError::QueryFailed)?,
            priority: r
                .priority
                .parse::<Priority>()
                .map_err(RepositoryError::QueryFailed)?,
            source_language: r.source_language,
            target_languages: r.target_languages,
            settings: JobSettings::from(r.settings),
            created_at: r.created_at,
            updated_at: r.updated_at,
            completed_at: r.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct FileRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub filename: String,
    pub object_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub media_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for JobFile {
    type Error = RepositoryError;

    fn try_from(r: FileRow) -> Result<Self, Self::Error> {
        Ok(JobFile {
            id: FileId::from_uuid(r.id),
            job_id: JobId::from_uuid(r.job_id),
            filename: r.filename,
            object_key: ObjectKey::from_raw(r.object_key),
            mime_type: r.mime_type,
            size_bytes: r.size_bytes.max(0) as u64,
            media_type: r
                .media_type
                .parse::<MediaType>()
                .map_err(RepositoryError::QueryFailed)?,
            status: r
                .status
                .parse::<FileStatus>()
                .map_err(RepositoryError::QueryFailed)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ArtifactRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_file_id: Uuid,
    pub artifact_type: String,
    pub language_code: Option<String>,
    pub object_key: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ArtifactRow> for JobArtifact {
    type Error = RepositoryError;

    fn try_from(r: ArtifactRow) -> Result<Self, Self::Error> {
        Ok(JobArtifact {
            id: ArtifactId::from_uuid(r.id),
            job_id: JobId::from_uuid(r.job_id),
            job_file_id: FileId::from_uuid(r.job_file_id),
            artifact_type: r
                .artifact_type
                .parse::<ArtifactType>()
                .map_err(RepositoryError::QueryFailed)?,
            language_code: r.language_code,
            object_key: ObjectKey::from_raw(r.object_key),
            version: r.version,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct EventRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub event_type: String,
    pub message: String,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<EventRow> for JobEvent {
    fn from(r: EventRow) -> Self {
        JobEvent {
            id: EventId::from_uuid(r.id),
            job_id: JobId::from_uuid(r.job_id),
            event_type: r.event_type,
            message: r.message,
            meta: r.meta,
            created_at: r.created_at,
        }
    }
}

pub(super) fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, RepositoryError>
where
    T: TryFrom<R, Error = RepositoryError>,
{
    rows.into_iter().map(T::try_from).collect()
}

pub(super) fn query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::ConnectionFailed(e.to_string())
        }
        sqlx::Error::Database(ref db)
            if db.is_unique_violation() || db.is_foreign_key_violation() =>
        {
            RepositoryError::ConstraintViolation(e.to_string())
        }
        _ => RepositoryError::QueryFailed(e.to_string()),
    }
}
