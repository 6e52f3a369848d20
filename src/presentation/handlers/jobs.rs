use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::application::services::{CreateJob, JobDetails, NewJobFile};
use crate::domain::{
    Job, JobArtifact, JobEvent, JobFile, JobId, JobSettings, MediaType, ObjectKey, Priority,
};
use crate::presentation::state::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub source_language: String,
    pub target_languages: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub files: Vec<JobFileRequest>,
}

#[derive(Debug, Deserialize)]
pub struct JobFileRequest {
    pub filename: String,
    pub object_key: String,
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    pub media_type: Option<String>,
}

#[derive(Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub status: String,
    pub priority: Priority,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileResponse>>,
}

impl JobResponse {
    fn from_job(job: Job, files: Option<Vec<JobFile>>) -> Self {
        Self {
            id: job.id.as_uuid(),
            status: job.status.as_str().to_string(),
            priority: job.priority,
            source_language: job.source_language,
            target_languages: job.target_languages,
            settings: job.settings.to_value(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
            files: files.map(|files| files.into_iter().map(FileResponse::from).collect()),
        }
    }
}

impl From<JobDetails> for JobResponse {
    fn from(details: JobDetails) -> Self {
        Self::from_job(details.job, Some(details.files))
    }
}

#[derive(Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub filename: String,
    pub object_key: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub media_type: String,
    pub status: String,
}

impl From<JobFile> for FileResponse {
    fn from(file: JobFile) -> Self {
        Self {
            id: file.id.as_uuid(),
            filename: file.filename,
            object_key: file.object_key.to_string(),
            mime_type: file.mime_type,
            size_bytes: file.size_bytes,
            media_type: file.media_type.as_str().to_string(),
            status: file.status.as_str().to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub event_type: String,
    pub message: String,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

impl From<JobEvent> for EventResponse {
    fn from(event: JobEvent) -> Self {
        Self {
            id: event.id.as_uuid(),
            event_type: event.event_type,
            message: event.message,
            meta: event.meta,
            created_at: event.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ArtifactResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub artifact_type: String,
    pub language_code: Option<String>,
    pub object_key: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl From<JobArtifact> for ArtifactResponse {
    fn from(artifact: JobArtifact) -> Self {
        Self {
            id: artifact.id.as_uuid(),
            file_id: artifact.job_file_id.as_uuid(),
            artifact_type: artifact.artifact_type.as_str().to_string(),
            language_code: artifact.language_code,
            object_key: artifact.object_key.to_string(),
            version: artifact.version,
            created_at: artifact.created_at,
        }
    }
}

fn into_create_job(request: CreateJobRequest) -> Result<CreateJob, ApiError> {
    if !matches!(request.settings, Value::Object(_) | Value::Null) {
        return Err(ApiError::bad_request("settings must be an object"));
    }

    let mut files = Vec::with_capacity(request.files.len());
    for file in request.files {
        let media_type = file
            .media_type
            .as_deref()
            .map(str::parse::<MediaType>)
            .transpose()
            .map_err(ApiError::bad_request)?;
        files.push(NewJobFile {
            filename: file.filename,
            object_key: ObjectKey::from_raw(file.object_key),
            mime_type: file.mime_type,
            size_bytes: file.size_bytes,
            media_type,
        });
    }

    Ok(CreateJob {
        source_language: request.source_language,
        target_languages: request.target_languages,
        priority: request.priority,
        settings: JobSettings::from(request.settings),
        files,
    })
}

#[tracing::instrument(skip(state, request))]
pub async fn create_job_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let details = state
        .job_service
        .create_job(into_create_job(request)?)
        .await?;
    Ok((StatusCode::CREATED, Json(details.into())))
}

#[tracing::instrument(skip(state))]
pub async fn get_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let details = state.job_service.get_job(JobId::from_uuid(job_id)).await?;
    Ok(Json(details.into()))
}

#[tracing::instrument(skip(state))]
pub async fn start_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let job = state
        .job_service
        .start_job(JobId::from_uuid(job_id))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(JobResponse::from_job(job, None))))
}

pub async fn job_events_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = state
        .job_service
        .list_events(JobId::from_uuid(job_id))
        .await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

pub async fn job_artifacts_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<ArtifactResponse>>, ApiError> {
    let artifacts = state
        .job_service
        .list_artifacts(JobId::from_uuid(job_id))
        .await?;
    Ok(Json(
        artifacts.into_iter().map(ArtifactResponse::from).collect(),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn complete_review_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .job_service
        .complete_review(JobId::from_uuid(job_id))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[tracing::instrument(skip(state))]
pub async fn delete_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .job_service
        .delete_job(JobId::from_uuid(job_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
