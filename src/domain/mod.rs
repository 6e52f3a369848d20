mod artifact_id;
mod event_id;
mod event_kind;
mod file_id;
mod file_status;
mod glossary;
mod job;
mod job_artifact;
mod job_event;
mod job_file;
mod job_id;
mod job_settings;
mod job_status;
mod media_type;
mod object_key;
mod priority;
mod segment;
mod stream_name;

pub use artifact_id::ArtifactId;
pub use event_id::EventId;
pub use event_kind::{EventKind, Stage};
pub use file_id::FileId;
pub use file_status::FileStatus;
pub use glossary::{Glossary, GlossaryProtector};
pub use job::Job;
pub use job_artifact::{ArtifactType, JobArtifact, NewArtifact};
pub use job_event::JobEvent;
pub use job_file::JobFile;
pub use job_id::JobId;
pub use job_settings::JobSettings;
pub use job_status::JobStatus;
pub use media_type::MediaType;
pub use object_key::ObjectKey;
pub use priority::Priority;
pub use segment::{Segment, SegmentDocument, TranslatedDocument, TranslatedSegment};
pub use stream_name::StreamName;
