use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::ports::{
    Delivery, EventBus, EventBusError, HandlerError, JobRepository, MessageHandler,
    REQUEST_ID_FIELD, RepositoryError, StreamMessage,
};
use crate::domain::{
    EventKind, FileId, FileStatus, Job, JobEvent, JobFile, JobId, JobStatus, Stage, StreamName,
};

use super::retry::{RetryPolicy, with_retry};

/// Consumes the `events` stream and drives jobs through the pipeline.
///
/// Decisions are derived from durable job, file and artifact state. Every
/// stage advance is a conditional status update and only the caller that
/// wins it publishes the next fan-out, so duplicate or reordered deliveries
/// never produce duplicate work.
pub struct Orchestrator {
    repository: Arc<dyn JobRepository>,
    bus: Arc<dyn EventBus>,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(repository: Arc<dyn JobRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            repository,
            bus,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Applies one event from the `events` stream.
    pub async fn apply(&self, message: &StreamMessage) -> Result<(), OrchestratorError> {
        let (kind, job_id) = parse_envelope(message)?;

        match kind {
            EventKind::JobStarted
            | EventKind::JobQueued
            | EventKind::StageStarted(_)
            | EventKind::ReviewRequired
            | EventKind::JobCompleted
            | EventKind::JobFailed => {
                debug!(event = kind.as_str(), "Informational event");
                return Ok(());
            }
            EventKind::ParseRequested
            | EventKind::TranscribeRequested
            | EventKind::TranslateRequested
            | EventKind::PostprocessRequested => {
                warn!(event = kind.as_str(), "Work request on events stream, dropping");
                return Ok(());
            }
            _ => {}
        }

        let job = self
            .repository
            .get_job(job_id)
            .await?
            .ok_or(OrchestratorError::JobNotFound(job_id))?;

        if job.status.is_terminal() {
            debug!(status = %job.status, event = kind.as_str(), "Job is terminal, ignoring");
            return Ok(());
        }

        match kind {
            EventKind::JobCreated => self.on_job_created(&job).await,
            EventKind::StageCompleted(stage) if message.get_bool("success") == Some(false) => {
                self.on_stage_failed(&job, stage, message).await
            }
            EventKind::StageCompleted(Stage::Parsing) => {
                self.on_parsing_completed(&job, message).await
            }
            EventKind::StageCompleted(Stage::Transcribing) => {
                self.on_transcribing_completed(&job, message).await
            }
            EventKind::StageCompleted(Stage::Translating) => {
                self.on_translating_completed(&job, message).await
            }
            EventKind::StageCompleted(Stage::Postprocessing) => {
                self.on_postprocessing_completed(&job).await
            }
            EventKind::StageFailed(stage) => self.on_stage_failed(&job, stage, message).await,
            EventKind::ReviewCompleted => self.on_review_completed(&job).await,
            _ => Ok(()),
        }
    }

    async fn on_job_created(&self, job: &Job) -> Result<(), OrchestratorError> {
        if !matches!(job.status, JobStatus::Created | JobStatus::Queued) {
            debug!(status = %job.status, "Job already started");
            return Ok(());
        }

        let files = self.repository.list_files(job.id).await?;
        if files.is_empty() {
            return self
                .fail_job(job.id, "job has no files", json!({"stage": "parsing"}))
                .await;
        }

        if !self
            .advance(job, &[JobStatus::Created, JobStatus::Queued], Stage::Parsing)
            .await?
        {
            return Ok(());
        }

        self.request_parsing(job, &files).await
    }

    async fn request_parsing(&self, job: &Job, files: &[JobFile]) -> Result<(), OrchestratorError> {
        let mut requests = Vec::with_capacity(files.len());
        for file in files {
            self.repository
                .advance_file_status(file.id, &[FileStatus::Uploaded], FileStatus::Parsing)
                .await?;
            requests.push(parse_request(job, file));
        }
        self.fan_out(job.id, Stage::Parsing, requests).await
    }

    async fn on_parsing_completed(
        &self,
        job: &Job,
        message: &StreamMessage,
    ) -> Result<(), OrchestratorError> {
        let Some(file) = self.reported_file(job, message).await? else {
            return Ok(());
        };

        let next = if file.media_type.requires_transcription() {
            FileStatus::Transcribing
        } else {
            FileStatus::Translating
        };
        self.repository
            .advance_file_status(file.id, &[FileStatus::Uploaded, FileStatus::Parsing], next)
            .await?;

        if job.status != JobStatus::Parsing {
            debug!(status = %job.status, "Parsing already aggregated");
            return Ok(());
        }

        let files = self.repository.list_files(job.id).await?;
        if !files.iter().all(|f| f.status.is_parsed()) {
            debug!(file_id = %file.id, "Waiting for remaining files to parse");
            return Ok(());
        }

        // Media whose transcript already arrived out of order is not requested again.
        let untranscribed: Vec<&JobFile> = files
            .iter()
            .filter(|f| f.media_type.requires_transcription())
            .filter(|f| !f.status.is_ready_for_translation())
            .collect();

        if untranscribed.is_empty() {
            info!(job_id = %job.id, "Nothing left to transcribe, starting translation");
            self.start_translation(job, &[JobStatus::Parsing], &files)
                .await
        } else {
            if !self
                .advance(job, &[JobStatus::Parsing], Stage::Transcribing)
                .await?
            {
                return Ok(());
            }
            let requests = untranscribed
                .iter()
                .map(|f| work_request(job, f, Stage::Transcribing))
                .collect();
            self.fan_out(job.id, Stage::Transcribing, requests).await
        }
    }

    async fn on_transcribing_completed(
        &self,
        job: &Job,
        message: &StreamMessage,
    ) -> Result<(), OrchestratorError> {
        let Some(file) = self.reported_file(job, message).await? else {
            return Ok(());
        };

        self.repository
            .advance_file_status(
                file.id,
                &[FileStatus::Parsing, FileStatus::Transcribing],
                FileStatus::Translating,
            )
            .await?;

        if job.status != JobStatus::Transcribing {
            debug!(status = %job.status, "Transcription already aggregated");
            return Ok(());
        }

        let files = self.repository.list_files(job.id).await?;
        let done = files
            .iter()
            .filter(|f| f.media_type.requires_transcription())
            .all(|f| f.status.is_ready_for_translation());
        if !done {
            debug!(file_id = %file.id, "Waiting for remaining transcriptions");
            return Ok(());
        }

        self.start_translation(job, &[JobStatus::Transcribing], &files)
            .await
    }

    async fn on_translating_completed(
        &self,
        job: &Job,
        message: &StreamMessage,
    ) -> Result<(), OrchestratorError> {
        let Some(language) = message.get_str("target_language") else {
            return self
                .fail_job(
                    job.id,
                    "translating.completed without target_language",
                    json!({"stage": "translating"}),
                )
                .await;
        };
        let Some(file) = self.reported_file(job, message).await? else {
            return Ok(());
        };

        let translated = self.repository.translated_pairs(job.id).await?;
        if !translated.contains(&(file.id, language.clone())) {
            return Err(OrchestratorError::NotYetVisible(format!(
                "translation artifact for file {} language {}",
                file.id, language
            )));
        }

        if job
            .target_languages
            .iter()
            .all(|lang| translated.contains(&(file.id, lang.clone())))
        {
            self.repository
                .advance_file_status(file.id, &[FileStatus::Translating], FileStatus::Completed)
                .await?;
        }

        if job.status != JobStatus::Translating {
            debug!(status = %job.status, "Translation already aggregated");
            return Ok(());
        }

        let files = self.repository.list_files(job.id).await?;
        let missing = missing_pairs(job, &files, &translated);
        if missing > 0 {
            debug!(missing, "Waiting for remaining translations");
            return Ok(());
        }

        if !self
            .advance(job, &[JobStatus::Translating], Stage::Postprocessing)
            .await?
        {
            return Ok(());
        }

        self.fan_out(job.id, Stage::Postprocessing, vec![postprocess_request(job)])
            .await
    }

    async fn on_postprocessing_completed(&self, job: &Job) -> Result<(), OrchestratorError> {
        if job.settings.human_review() {
            if self
                .repository
                .transition_status(job.id, &[JobStatus::Postprocessing], JobStatus::Review)
                .await?
            {
                info!(job_id = %job.id, "Awaiting human review");
                self.record(job.id, EventKind::ReviewRequired, "Awaiting human review", json!({}))
                    .await?;
                self.notify(job.id, EventKind::ReviewRequired).await;
            }
            return Ok(());
        }

        self.complete(job.id, &[JobStatus::Postprocessing]).await
    }

    async fn on_review_completed(&self, job: &Job) -> Result<(), OrchestratorError> {
        if job.status != JobStatus::Review {
            debug!(status = %job.status, "Review completion outside review, ignoring");
            return Ok(());
        }
        self.complete(job.id, &[JobStatus::Review]).await
    }

    async fn on_stage_failed(
        &self,
        job: &Job,
        stage: Stage,
        message: &StreamMessage,
    ) -> Result<(), OrchestratorError> {
        let error = message
            .get_str("error")
            .unwrap_or_else(|| "unknown error".to_string());
        let file_id = message.get_str("file_id");

        if let Some(file_id) = file_id.as_deref().and_then(|raw| raw.parse::<FileId>().ok()) {
            self.repository
                .advance_file_status(
                    file_id,
                    &[
                        FileStatus::Uploaded,
                        FileStatus::Parsing,
                        FileStatus::Transcribing,
                        FileStatus::Translating,
                    ],
                    FileStatus::Failed,
                )
                .await?;
        }

        let meta = json!({
            "stage": stage.as_str(),
            "file_id": file_id,
            "target_language": message.get_str("target_language"),
            "error": error,
        });
        self.fail_job(job.id, &format!("{} failed: {}", stage, error), meta)
            .await
    }

    async fn start_translation(
        &self,
        job: &Job,
        from: &[JobStatus],
        files: &[JobFile],
    ) -> Result<(), OrchestratorError> {
        if !self.advance(job, from, Stage::Translating).await? {
            return Ok(());
        }

        let requests = files
            .iter()
            .flat_map(|file| {
                job.target_languages
                    .iter()
                    .map(move |language| translate_request(job, file, language))
            })
            .collect();
        self.fan_out(job.id, Stage::Translating, requests).await
    }

    /// Re-issues the outstanding work of in-flight jobs that have not moved
    /// for `stale_after`. A job whose stage advance won but whose fan-out was
    /// never published would otherwise wait forever. Returns the number of
    /// jobs resumed.
    pub async fn resume_stalled(&self, stale_after: Duration) -> Result<usize, OrchestratorError> {
        let Some(cutoff) = TimeDelta::from_std(stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };

        let mut resumed = 0;
        for status in [
            JobStatus::Queued,
            JobStatus::Parsing,
            JobStatus::Transcribing,
            JobStatus::Translating,
            JobStatus::Postprocessing,
        ] {
            for job in self.repository.list_by_status(status).await? {
                if job.updated_at > cutoff {
                    continue;
                }
                if self.resume(&job).await? {
                    resumed += 1;
                }
            }
        }

        if resumed > 0 {
            info!(jobs = resumed, "Resumed stalled jobs");
        }
        Ok(resumed)
    }

    async fn resume(&self, job: &Job) -> Result<bool, OrchestratorError> {
        let files = self.repository.list_files(job.id).await?;
        let (stage, requests) = match job.status {
            JobStatus::Queued => {
                info!(job_id = %job.id, "Resuming queued job");
                self.on_job_created(job).await?;
                return Ok(true);
            }
            JobStatus::Parsing => {
                let unparsed: Vec<JobFile> = files
                    .into_iter()
                    .filter(|f| matches!(f.status, FileStatus::Uploaded | FileStatus::Parsing))
                    .collect();
                if unparsed.is_empty() {
                    return Ok(false);
                }
                info!(job_id = %job.id, files = unparsed.len(), "Resuming parsing");
                self.request_parsing(job, &unparsed).await?;
                return Ok(true);
            }
            JobStatus::Transcribing => (
                Stage::Transcribing,
                files
                    .iter()
                    .filter(|f| f.media_type.requires_transcription())
                    .filter(|f| !f.status.is_ready_for_translation())
                    .map(|f| work_request(job, f, Stage::Transcribing))
                    .collect::<Vec<_>>(),
            ),
            JobStatus::Translating => {
                let translated = self.repository.translated_pairs(job.id).await?;
                let translated = &translated;
                let requests = files
                    .iter()
                    .flat_map(|file| {
                        job.target_languages
                            .iter()
                            .filter(move |lang| !translated.contains(&(file.id, (*lang).clone())))
                            .map(move |lang| translate_request(job, file, lang))
                    })
                    .collect::<Vec<_>>();
                (Stage::Translating, requests)
            }
            JobStatus::Postprocessing => (Stage::Postprocessing, vec![postprocess_request(job)]),
            _ => return Ok(false),
        };

        if requests.is_empty() {
            return Ok(false);
        }
        info!(job_id = %job.id, stage = stage.as_str(), requests = requests.len(), "Resuming stage");
        self.fan_out(job.id, stage, requests).await?;
        Ok(true)
    }

    async fn complete(&self, job_id: JobId, from: &[JobStatus]) -> Result<(), OrchestratorError> {
        if self
            .repository
            .transition_status(job_id, from, JobStatus::Completed)
            .await?
        {
            info!(job_id = %job_id, "Job completed");
            self.record(job_id, EventKind::JobCompleted, "Job completed", json!({}))
                .await?;
            self.notify(job_id, EventKind::JobCompleted).await;
        }
        Ok(())
    }

    /// Moves the job into `stage`. Returns false when another delivery got there first.
    async fn advance(
        &self,
        job: &Job,
        from: &[JobStatus],
        stage: Stage,
    ) -> Result<bool, OrchestratorError> {
        let to = stage_status(stage);
        let won = self.repository.transition_status(job.id, from, to).await?;
        if won {
            info!(job_id = %job.id, status = %to, "Stage started");
            self.record(
                job.id,
                EventKind::StageStarted(stage),
                &format!("{} started", stage),
                json!({}),
            )
            .await?;
        } else {
            debug!(job_id = %job.id, status = %to, "Stage advance lost race");
        }
        Ok(won)
    }

    async fn fan_out(
        &self,
        job_id: JobId,
        stage: Stage,
        requests: Vec<StreamMessage>,
    ) -> Result<(), OrchestratorError> {
        let stream = stage.work_stream();
        let total = requests.len();
        for request in &requests {
            let published = with_retry(&self.retry, "publish work request", || {
                self.bus.publish(stream, request)
            })
            .await;
            if let Err(e) = published {
                return self
                    .fail_job(
                        job_id,
                        &format!("could not publish {} requests: {}", stage, e),
                        json!({"stage": stage.as_str(), "stream": stream.as_str()}),
                    )
                    .await;
            }
        }
        info!(job_id = %job_id, stream = stream.as_str(), count = total, "Published work requests");
        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: JobId,
        reason: &str,
        meta: serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        if self
            .repository
            .transition_status(job_id, &JobStatus::NON_TERMINAL, JobStatus::Failed)
            .await?
        {
            warn!(job_id = %job_id, reason, "Job failed");
            self.record(job_id, EventKind::JobFailed, reason, meta).await?;
            self.notify(job_id, EventKind::JobFailed).await;
        }
        Ok(())
    }

    /// Resolves the file a stage event is about. Returns `None` after failing
    /// the job when the payload names no usable file.
    async fn reported_file(
        &self,
        job: &Job,
        message: &StreamMessage,
    ) -> Result<Option<JobFile>, OrchestratorError> {
        let kind = message.event_type().unwrap_or_default();
        let Some(file_id) = message
            .get_str("file_id")
            .and_then(|raw| raw.parse::<FileId>().ok())
        else {
            self.fail_job(
                job.id,
                &format!("{} without a valid file_id", kind),
                json!({"event": kind}),
            )
            .await?;
            return Ok(None);
        };

        let file = self
            .repository
            .get_file(file_id)
            .await?
            .ok_or(OrchestratorError::FileNotFound(file_id))?;

        if file.job_id != job.id {
            warn!(file_id = %file_id, owner = %file.job_id, "File belongs to another job, ignoring");
            return Ok(None);
        }
        Ok(Some(file))
    }

    async fn record(
        &self,
        job_id: JobId,
        kind: EventKind,
        message: &str,
        meta: serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        self.repository
            .append_event(&JobEvent::new(job_id, kind, message).with_meta(meta))
            .await?;
        Ok(())
    }

    /// Announces a lifecycle change on `events`. Listeners are informational only.
    async fn notify(&self, job_id: JobId, kind: EventKind) {
        let message = StreamMessage::new(kind, job_id);
        if let Err(e) = with_retry(&self.retry, "publish notification", || {
            self.bus.publish(StreamName::Events, &message)
        })
        .await
        {
            warn!(job_id = %job_id, event = kind.as_str(), error = %e, "Notification not published");
        }
    }
}

#[async_trait]
impl MessageHandler for Orchestrator {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        self.apply(&delivery.message).await.map_err(HandlerError::from)
    }

    /// An event that keeps failing can no longer advance its job, so the job fails.
    async fn on_dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), HandlerError> {
        let Ok((kind, job_id)) = parse_envelope(&delivery.message) else {
            return Ok(());
        };
        let meta = json!({
            "event": kind.as_str(),
            "message_id": delivery.id.as_str(),
            "deliveries": delivery.delivery_count,
            "error": reason,
        });
        self.fail_job(job_id, &format!("handler error: {}", reason), meta)
            .await
            .map_err(|e| {
                error!(job_id = %job_id, error = %e, "Could not fail job for dead-lettered event");
                HandlerError::Retry(e.to_string())
            })
    }
}

fn parse_envelope(message: &StreamMessage) -> Result<(EventKind, JobId), OrchestratorError> {
    let event = message
        .event_type()
        .ok_or_else(|| OrchestratorError::Malformed("missing event".to_string()))?;
    let kind = event
        .parse::<EventKind>()
        .map_err(OrchestratorError::Malformed)?;
    let job_id = message
        .get_str("job_id")
        .ok_or_else(|| OrchestratorError::Malformed("missing job_id".to_string()))?
        .parse::<JobId>()
        .map_err(|e| OrchestratorError::Malformed(format!("invalid job_id: {}", e)))?;
    Ok((kind, job_id))
}

fn stage_status(stage: Stage) -> JobStatus {
    match stage {
        Stage::Parsing => JobStatus::Parsing,
        Stage::Transcribing => JobStatus::Transcribing,
        Stage::Translating => JobStatus::Translating,
        Stage::Postprocessing => JobStatus::Postprocessing,
    }
}

fn work_request(job: &Job, file: &JobFile, stage: Stage) -> StreamMessage {
    StreamMessage::new(stage.request_kind(), job.id)
        .with(REQUEST_ID_FIELD, Uuid::new_v4().to_string())
        .with("file_id", file.id.to_string())
        .with("object_key", file.object_key.as_str())
        .with("media_type", file.media_type.as_str())
        .with("source_language", job.source_language.as_str())
}

fn parse_request(job: &Job, file: &JobFile) -> StreamMessage {
    work_request(job, file, Stage::Parsing)
        .with("mime_type", file.mime_type.as_str())
        .with("filename", file.filename.as_str())
}

fn translate_request(job: &Job, file: &JobFile, language: &str) -> StreamMessage {
    let mut request =
        work_request(job, file, Stage::Translating).with("target_language", language);
    if let Some(glossary_id) = job.settings.glossary_id() {
        request.insert("glossary_id", glossary_id.to_string());
    }
    request
}

fn postprocess_request(job: &Job) -> StreamMessage {
    StreamMessage::new(EventKind::PostprocessRequested, job.id)
        .with(REQUEST_ID_FIELD, Uuid::new_v4().to_string())
        .with("source_language", job.source_language.as_str())
        .with("target_languages", json!(job.target_languages))
        .with("delivery_formats", json!(job.settings.delivery_formats()))
        .with("settings", job.settings.to_value())
}

fn missing_pairs(job: &Job, files: &[JobFile], translated: &HashSet<(FileId, String)>) -> usize {
    files
        .iter()
        .flat_map(|f| job.target_languages.iter().map(move |l| (f.id, l.clone())))
        .filter(|pair| !translated.contains(pair))
        .count()
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("file {0} not found")]
    FileNotFound(FileId),
    #[error("not yet visible: {0}")]
    NotYetVisible(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("event bus: {0}")]
    Bus(#[from] EventBusError),
}

impl OrchestratorError {
    /// Whether a redelivery of the same message could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, OrchestratorError::Malformed(_))
    }
}

impl From<OrchestratorError> for HandlerError {
    fn from(e: OrchestratorError) -> Self {
        if e.is_transient() {
            HandlerError::Retry(e.to_string())
        } else {
            HandlerError::Discard(e.to_string())
        }
    }
}
