mod job_service;
mod orchestrator;
mod retry;
mod stage_worker;
mod stream_consumer;
mod translation_stage;

pub use job_service::{
    CreateJob, JobDetails, JobService, JobServiceError, NewJobFile, UploadedFile,
};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use retry::{RetryPolicy, with_retry};
pub use stage_worker::{StageWorker, StageWorkerError};
pub use stream_consumer::{ConsumerConfig, Disposition, StreamConsumer};
pub use translation_stage::TranslationStage;
