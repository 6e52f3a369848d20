use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::{ArtifactId, FileId, JobId, ObjectKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactType {
    Parsed,
    Transcript,
    Translation,
    Subtitle,
    Audio,
    Final,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Parsed => "parsed",
            ArtifactType::Transcript => "transcript",
            ArtifactType::Translation => "translation",
            ArtifactType::Subtitle => "subtitle",
            ArtifactType::Audio => "audio",
            ArtifactType::Final => "final",
        }
    }

    /// Language-bound artifacts are only meaningful with a `language_code`.
    pub fn is_language_bound(&self) -> bool {
        matches!(
            self,
            ArtifactType::Translation | ArtifactType::Subtitle | ArtifactType::Audio
        )
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parsed" => Ok(ArtifactType::Parsed),
            "transcript" => Ok(ArtifactType::Transcript),
            "translation" => Ok(ArtifactType::Translation),
            "subtitle" => Ok(ArtifactType::Subtitle),
            "audio" => Ok(ArtifactType::Audio),
            "final" => Ok(ArtifactType::Final),
            _ => Err(format!("Invalid artifact type: {}", s)),
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobArtifact {
    pub id: ArtifactId,
    pub job_id: JobId,
    pub job_file_id: FileId,
    pub artifact_type: ArtifactType,
    pub language_code: Option<String>,
    pub object_key: ObjectKey,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// An artifact a worker wants recorded. The store assigns id and version.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArtifact {
    pub job_id: JobId,
    pub job_file_id: FileId,
    pub artifact_type: ArtifactType,
    pub language_code: Option<String>,
    pub object_key: ObjectKey,
}

impl NewArtifact {
    pub fn new(
        job_id: JobId,
        job_file_id: FileId,
        artifact_type: ArtifactType,
        object_key: ObjectKey,
    ) -> Self {
        Self {
            job_id,
            job_file_id,
            artifact_type,
            language_code: None,
            object_key,
        }
    }

    pub fn with_language(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = Some(language_code.into());
        self
    }

    /// True when `artifact` records the same output as this request.
    pub fn matches(&self, artifact: &JobArtifact) -> bool {
        artifact.job_file_id == self.job_file_id
            && artifact.artifact_type == self.artifact_type
            && artifact.language_code == self.language_code
            && artifact.object_key == self.object_key
    }

    /// True when `artifact` lives in the same version series as this request.
    pub fn same_series(&self, artifact: &JobArtifact) -> bool {
        artifact.job_file_id == self.job_file_id
            && artifact.artifact_type == self.artifact_type
            && artifact.language_code == self.language_code
    }
}
