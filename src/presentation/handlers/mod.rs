mod error;
mod health;
mod jobs;
mod uploads;

pub use error::{ApiError, ErrorResponse};
pub use health::{backlog_handler, health_handler};
pub use jobs::{
    complete_review_handler, create_job_handler, delete_job_handler, get_job_handler,
    job_artifacts_handler, job_events_handler, start_job_handler,
};
pub use uploads::upload_handler;
