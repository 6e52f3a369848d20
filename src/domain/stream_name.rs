use std::fmt;

/// Logical stream names. The physical key is `<prefix>.<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamName {
    Events,
    Parsing,
    Transcription,
    Translation,
    Postprocessing,
    DeadLetter,
}

impl StreamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamName::Events => "events",
            StreamName::Parsing => "parsing",
            StreamName::Transcription => "transcription",
            StreamName::Translation => "translation",
            StreamName::Postprocessing => "postprocessing",
            StreamName::DeadLetter => "dead_letter",
        }
    }

    pub fn key(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}.{}", prefix, self.as_str())
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
