use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Created,
    Queued,
    Parsing,
    Transcribing,
    Translating,
    Postprocessing,
    Review,
    Completed,
    Failed,
}

impl JobStatus {
    /// Statuses during which stage workers may still be writing results for the job.
    pub const MID_PIPELINE: [JobStatus; 3] = [
        JobStatus::Parsing,
        JobStatus::Transcribing,
        JobStatus::Translating,
    ];

    /// Every status a job can fail from.
    pub const NON_TERMINAL: [JobStatus; 7] = [
        JobStatus::Created,
        JobStatus::Queued,
        JobStatus::Parsing,
        JobStatus::Transcribing,
        JobStatus::Translating,
        JobStatus::Postprocessing,
        JobStatus::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Queued => "QUEUED",
            JobStatus::Parsing => "PARSING",
            JobStatus::Transcribing => "TRANSCRIBING",
            JobStatus::Translating => "TRANSLATING",
            JobStatus::Postprocessing => "POSTPROCESSING",
            JobStatus::Review => "REVIEW",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_mid_pipeline(&self) -> bool {
        Self::MID_PIPELINE.contains(self)
    }

    /// Position along the forward pipeline. `Failed` sits outside the ordering.
    fn rank(&self) -> Option<u8> {
        match self {
            JobStatus::Created => Some(0),
            JobStatus::Queued => Some(1),
            JobStatus::Parsing => Some(2),
            JobStatus::Transcribing => Some(3),
            JobStatus::Translating => Some(4),
            JobStatus::Postprocessing => Some(5),
            JobStatus::Review => Some(6),
            JobStatus::Completed => Some(7),
            JobStatus::Failed => None,
        }
    }

    /// Whether moving from `self` to `next` respects the monotonic pipeline order.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(JobStatus::Created),
            "QUEUED" => Ok(JobStatus::Queued),
            "PARSING" => Ok(JobStatus::Parsing),
            "TRANSCRIBING" => Ok(JobStatus::Transcribing),
            "TRANSLATING" => Ok(JobStatus::Translating),
            "POSTPROCESSING" => Ok(JobStatus::Postprocessing),
            "REVIEW" => Ok(JobStatus::Review),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
