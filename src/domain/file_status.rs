use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    Uploaded,
    Parsing,
    Transcribing,
    Translating,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "UPLOADED",
            FileStatus::Parsing => "PARSING",
            FileStatus::Transcribing => "TRANSCRIBING",
            FileStatus::Translating => "TRANSLATING",
            FileStatus::Completed => "COMPLETED",
            FileStatus::Failed => "FAILED",
        }
    }

    /// True once the parser has reported this file, whatever came after.
    pub fn is_parsed(&self) -> bool {
        matches!(
            self,
            FileStatus::Transcribing | FileStatus::Translating | FileStatus::Completed
        )
    }

    /// True once the file is eligible for (or finished with) translation.
    pub fn is_ready_for_translation(&self) -> bool {
        matches!(self, FileStatus::Translating | FileStatus::Completed)
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOADED" => Ok(FileStatus::Uploaded),
            "PARSING" => Ok(FileStatus::Parsing),
            "TRANSCRIBING" => Ok(FileStatus::Transcribing),
            "TRANSLATING" => Ok(FileStatus::Translating),
            "COMPLETED" => Ok(FileStatus::Completed),
            "FAILED" => Ok(FileStatus::Failed),
            _ => Err(format!("Invalid file status: {}", s)),
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
