use std::fmt;
use std::str::FromStr;

use super::StreamName;

/// One of the four worker-driven pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parsing,
    Transcribing,
    Translating,
    Postprocessing,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Parsing,
        Stage::Transcribing,
        Stage::Translating,
        Stage::Postprocessing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsing => "parsing",
            Stage::Transcribing => "transcribing",
            Stage::Translating => "translating",
            Stage::Postprocessing => "postprocessing",
        }
    }

    /// Stream the stage's workers consume from.
    pub fn work_stream(&self) -> StreamName {
        match self {
            Stage::Parsing => StreamName::Parsing,
            Stage::Transcribing => StreamName::Transcription,
            Stage::Translating => StreamName::Translation,
            Stage::Postprocessing => StreamName::Postprocessing,
        }
    }

    /// Event type carried by work requests published to `work_stream`.
    pub fn request_kind(&self) -> EventKind {
        match self {
            Stage::Parsing => EventKind::ParseRequested,
            Stage::Transcribing => EventKind::TranscribeRequested,
            Stage::Translating => EventKind::TranslateRequested,
            Stage::Postprocessing => EventKind::PostprocessRequested,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every event type that travels on the bus.
///
/// The `*Requested` kinds are work requests for the stage streams; the rest
/// form the `events` stream vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobCreated,
    JobStarted,
    JobQueued,
    StageStarted(Stage),
    StageCompleted(Stage),
    StageFailed(Stage),
    ReviewRequired,
    ReviewCompleted,
    JobCompleted,
    JobFailed,
    ParseRequested,
    TranscribeRequested,
    TranslateRequested,
    PostprocessRequested,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::JobCreated => "job.created",
            EventKind::JobStarted => "job.started",
            EventKind::JobQueued => "job.queued",
            EventKind::StageStarted(Stage::Parsing) => "parsing.started",
            EventKind::StageStarted(Stage::Transcribing) => "transcribing.started",
            EventKind::StageStarted(Stage::Translating) => "translating.started",
            EventKind::StageStarted(Stage::Postprocessing) => "postprocessing.started",
            EventKind::StageCompleted(Stage::Parsing) => "parsing.completed",
            EventKind::StageCompleted(Stage::Transcribing) => "transcribing.completed",
            EventKind::StageCompleted(Stage::Translating) => "translating.completed",
            EventKind::StageCompleted(Stage::Postprocessing) => "postprocessing.completed",
            EventKind::StageFailed(Stage::Parsing) => "parsing.failed",
            EventKind::StageFailed(Stage::Transcribing) => "transcribing.failed",
            EventKind::StageFailed(Stage::Translating) => "translating.failed",
            EventKind::StageFailed(Stage::Postprocessing) => "postprocessing.failed",
            EventKind::ReviewRequired => "review.required",
            EventKind::ReviewCompleted => "review.completed",
            EventKind::JobCompleted => "job.completed",
            EventKind::JobFailed => "job.failed",
            EventKind::ParseRequested => "file.parse",
            EventKind::TranscribeRequested => "file.transcribe",
            EventKind::TranslateRequested => "file.translate",
            EventKind::PostprocessRequested => "job.postprocess",
        }
    }

    pub fn all() -> Vec<EventKind> {
        let mut kinds = vec![
            EventKind::JobCreated,
            EventKind::JobStarted,
            EventKind::JobQueued,
            EventKind::ReviewRequired,
            EventKind::ReviewCompleted,
            EventKind::JobCompleted,
            EventKind::JobFailed,
            EventKind::ParseRequested,
            EventKind::TranscribeRequested,
            EventKind::TranslateRequested,
            EventKind::PostprocessRequested,
        ];
        for stage in Stage::ALL {
            kinds.push(EventKind::StageStarted(stage));
            kinds.push(EventKind::StageCompleted(stage));
            kinds.push(EventKind::StageFailed(stage));
        }
        kinds
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown event type: {}", s))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
