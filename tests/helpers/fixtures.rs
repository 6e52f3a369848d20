use std::sync::Arc;

use serde_json::Value;

use dragoman::application::ports::{JobRepository, StreamMessage};
use dragoman::application::services::{Orchestrator, RetryPolicy};
use dragoman::domain::{
    ArtifactType, EventKind, FileId, Job, JobFile, JobId, JobSettings, MediaType, NewArtifact,
    ObjectKey, Priority, Stage,
};
use dragoman::infrastructure::event_bus::InMemoryEventBus;
use dragoman::infrastructure::persistence::InMemoryJobRepository;

pub const PDF: &str = "application/pdf";
pub const MP3: &str = "audio/mpeg";

/// Orchestrator wired to in-memory adapters, with direct access to both.
pub struct Pipeline {
    pub repository: Arc<InMemoryJobRepository>,
    pub bus: Arc<InMemoryEventBus>,
    pub orchestrator: Orchestrator,
}

impl Pipeline {
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryJobRepository::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let orchestrator = Orchestrator::new(repository.clone(), bus.clone())
            .with_retry_policy(RetryPolicy::none());
        Self {
            repository,
            bus,
            orchestrator,
        }
    }

    pub async fn job(&self, id: JobId) -> Job {
        self.repository.get_job(id).await.unwrap().unwrap()
    }

    pub async fn file(&self, id: FileId) -> JobFile {
        self.repository.get_file(id).await.unwrap().unwrap()
    }

    /// Marks a (file, language) pair translated the way a worker would.
    pub async fn record_translation(&self, job: &Job, file: &JobFile, language: &str) {
        self.repository
            .record_artifacts(&[NewArtifact::new(
                job.id,
                file.id,
                ArtifactType::Translation,
                ObjectKey::translation(job.id, file.id, language, "run-1"),
            )
            .with_language(language)])
            .await
            .unwrap();
    }

    pub async fn event_types(&self, id: JobId) -> Vec<String> {
        self.repository
            .list_events(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

/// Persists a CREATED job with one file per `(filename, mime)` pair.
pub async fn seed_job(
    repository: &dyn JobRepository,
    targets: &[&str],
    files: &[(&str, &str)],
    settings: Value,
) -> (Job, Vec<JobFile>) {
    let job = Job::new(
        "en".to_string(),
        targets.iter().map(|t| t.to_string()).collect(),
        Priority::Normal,
        JobSettings::from(settings),
    );
    let files: Vec<JobFile> = files
        .iter()
        .map(|(name, mime)| {
            JobFile::new(
                job.id,
                name.to_string(),
                ObjectKey::from_raw(format!("uploads/test/{}", name)),
                mime.to_string(),
                1024,
                MediaType::from_mime(mime).unwrap(),
            )
        })
        .collect();
    repository.create_job(&job, &files).await.unwrap();
    (job, files)
}

pub fn job_created(job: &Job) -> StreamMessage {
    StreamMessage::new(EventKind::JobCreated, job.id)
}

pub fn stage_completed(job: &Job, stage: Stage, file: &JobFile) -> StreamMessage {
    StreamMessage::new(EventKind::StageCompleted(stage), job.id)
        .with("file_id", file.id.to_string())
        .with("success", true)
}

pub fn translation_completed(job: &Job, file: &JobFile, language: &str) -> StreamMessage {
    stage_completed(job, Stage::Translating, file).with("target_language", language)
}

pub fn stage_failed(job: &Job, stage: Stage, file: &JobFile, error: &str) -> StreamMessage {
    StreamMessage::new(EventKind::StageFailed(stage), job.id)
        .with("file_id", file.id.to_string())
        .with("success", false)
        .with("error", error)
}
