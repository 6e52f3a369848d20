mod blob_store;
mod event_bus;
mod glossary_repository;
mod job_repository;
mod message_handler;
mod repository_error;
mod stage_processor;
mod translation_engine;

pub use blob_store::{BlobStore, BlobStoreError};
pub use event_bus::{
    Delivery, EventBus, EventBusError, MessageId, PendingSummary, StreamMessage, TIMESTAMP_FIELD,
};
pub use glossary_repository::GlossaryRepository;
pub use job_repository::{DeleteOutcome, JobRepository};
pub use message_handler::{HandlerError, MessageHandler};
pub use repository_error::RepositoryError;
pub use stage_processor::{
    REQUEST_ID_FIELD, StageError, StageOutput, StageProcessor, WorkRequest,
};
pub use translation_engine::{TranslationEngine, TranslationError};
