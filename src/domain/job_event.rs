use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{EventId, EventKind, JobId};

/// Audit log entry. Written once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub id: EventId,
    pub job_id: JobId,
    pub event_type: String,
    pub message: String,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: JobId, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            job_id,
            event_type: kind.as_str().to_string(),
            message: message.into(),
            meta: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}
