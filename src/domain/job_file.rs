use chrono::{DateTime, Utc};

use super::{FileId, FileStatus, JobId, MediaType, ObjectKey};

#[derive(Debug, Clone, PartialEq)]
pub struct JobFile {
    pub id: FileId,
    pub job_id: JobId,
    pub filename: String,
    pub object_key: ObjectKey,
    pub mime_type: String,
    pub size_bytes: u64,
    pub media_type: MediaType,
    pub status: FileStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobFile {
    pub fn new(
        job_id: JobId,
        filename: String,
        object_key: ObjectKey,
        mime_type: String,
        size_bytes: u64,
        media_type: MediaType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: FileId::new(),
            job_id,
            filename,
            object_key,
            mime_type,
            size_bytes,
            media_type,
            status: FileStatus::Uploaded,
            created_at: now,
            updated_at: now,
        }
    }
}
