use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::ports::{
    Delivery, EventBus, EventBusError, HandlerError, JobRepository, MessageHandler,
    REQUEST_ID_FIELD, RepositoryError, StageError, StageProcessor, StreamMessage, WorkRequest,
};
use crate::domain::{EventKind, FileId, JobId, ObjectKey, StreamName};

use super::retry::{RetryPolicy, with_retry};

/// Runs a [`StageProcessor`] against its stage stream and reports back on `events`.
pub struct StageWorker<P> {
    processor: Arc<P>,
    repository: Arc<dyn JobRepository>,
    bus: Arc<dyn EventBus>,
    retry: RetryPolicy,
}

impl<P> StageWorker<P>
where
    P: StageProcessor + 'static,
{
    pub fn new(
        processor: Arc<P>,
        repository: Arc<dyn JobRepository>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            processor,
            repository,
            bus,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn stream(&self) -> StreamName {
        self.processor.stage().work_stream()
    }

    pub async fn execute(&self, message: &StreamMessage) -> Result<(), StageWorkerError> {
        let stage = self.processor.stage();
        let request = parse_request(message, stage.request_kind())?;

        if !self.job_is_live(request.job_id).await? {
            return Ok(());
        }

        let output = match self.processor.process(&request).await {
            Ok(output) if output.artifacts.is_empty() => {
                Err(StageError::Processing("stage produced no artifacts".to_string()))
            }
            other => other,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) if e.is_transient() => return Err(StageWorkerError::Transient(e.to_string())),
            Err(e) => {
                warn!(job_id = %request.job_id, stage = stage.as_str(), error = %e, "Stage failed");
                let failed = report(&request, EventKind::StageFailed(stage))
                    .with("success", false)
                    .with("error", e.to_string());
                return self.publish(&failed).await;
            }
        };

        // The job may have been deleted while we were working.
        if !self.job_is_live(request.job_id).await? {
            return Ok(());
        }

        let recorded = self.repository.record_artifacts(&output.artifacts).await?;

        let mut completed = report(&request, EventKind::StageCompleted(stage))
            .with("success", true)
            .with("artifact_count", recorded.len() as u64);
        for (key, value) in output.result {
            completed.insert(key, value);
        }
        self.publish(&completed).await?;

        info!(
            job_id = %request.job_id,
            stage = stage.as_str(),
            artifacts = recorded.len(),
            "Stage completed"
        );
        Ok(())
    }

    async fn job_is_live(&self, job_id: JobId) -> Result<bool, StageWorkerError> {
        match self.repository.get_job(job_id).await? {
            None => {
                info!(job_id = %job_id, "Job no longer exists, dropping work");
                Ok(false)
            }
            Some(job) if job.status.is_terminal() => {
                debug!(job_id = %job_id, status = %job.status, "Job is terminal, dropping work");
                Ok(false)
            }
            Some(_) => Ok(true),
        }
    }

    async fn publish(&self, message: &StreamMessage) -> Result<(), StageWorkerError> {
        with_retry(&self.retry, "publish stage result", || {
            self.bus.publish(StreamName::Events, message)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl<P> MessageHandler for StageWorker<P>
where
    P: StageProcessor + 'static,
{
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        // Requests published without an id are named after their stream entry,
        // which redeliveries share.
        let result = if delivery.message.get_str(REQUEST_ID_FIELD).is_some() {
            self.execute(&delivery.message).await
        } else {
            let message = delivery
                .message
                .clone()
                .with(REQUEST_ID_FIELD, delivery.id.as_str());
            self.execute(&message).await
        };
        result.map_err(HandlerError::from)
    }

    /// Reports the request as failed so the job does not wait for it forever.
    async fn on_dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), HandlerError> {
        let stage = self.processor.stage();
        let Ok(request) = parse_request(&delivery.message, stage.request_kind()) else {
            return Ok(());
        };
        if !self.job_is_live(request.job_id).await.map_err(HandlerError::from)? {
            return Ok(());
        }

        warn!(
            job_id = %request.job_id,
            stage = stage.as_str(),
            deliveries = delivery.delivery_count,
            "Giving up on work request"
        );
        let failed = report(&request, EventKind::StageFailed(stage))
            .with("success", false)
            .with(
                "error",
                format!(
                    "gave up after {} deliveries: {}",
                    delivery.delivery_count, reason
                ),
            );
        self.publish(&failed).await.map_err(HandlerError::from)
    }
}

fn parse_request(
    message: &StreamMessage,
    expected: EventKind,
) -> Result<WorkRequest, StageWorkerError> {
    let event = message.event_type().unwrap_or_default();
    if event != expected.as_str() {
        return Err(StageWorkerError::InvalidRequest(format!(
            "expected {}, got '{}'",
            expected, event
        )));
    }

    let job_id = message
        .get_str("job_id")
        .and_then(|raw| raw.parse::<JobId>().ok())
        .ok_or_else(|| StageWorkerError::InvalidRequest("missing or invalid job_id".to_string()))?;

    let file_id = match message.get_str("file_id") {
        Some(raw) => Some(raw.parse::<FileId>().map_err(|e| {
            StageWorkerError::InvalidRequest(format!("invalid file_id: {}", e))
        })?),
        None => None,
    };

    let request_id = message
        .get_str(REQUEST_ID_FIELD)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Ok(WorkRequest {
        job_id,
        request_id,
        file_id,
        object_key: message.get_str("object_key").map(ObjectKey::from_raw),
        source_language: message.get_str("source_language"),
        target_language: message.get_str("target_language"),
        message: message.clone(),
    })
}

/// Skeleton of the event reporting on `request`.
fn report(request: &WorkRequest, kind: EventKind) -> StreamMessage {
    let mut message = StreamMessage::new(kind, request.job_id);
    if let Some(file_id) = request.file_id {
        message.insert("file_id", file_id.to_string());
    }
    if let Some(language) = &request.target_language {
        message.insert("target_language", language.as_str());
    }
    message
}

#[derive(Debug, thiserror::Error)]
pub enum StageWorkerError {
    #[error("invalid work request: {0}")]
    InvalidRequest(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("event bus: {0}")]
    Bus(#[from] EventBusError),
}

impl From<StageWorkerError> for HandlerError {
    fn from(e: StageWorkerError) -> Self {
        match e {
            StageWorkerError::InvalidRequest(_) => HandlerError::Discard(e.to_string()),
            _ => HandlerError::Retry(e.to_string()),
        }
    }
}
