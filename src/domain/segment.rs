use serde::{Deserialize, Serialize};

/// Unit of text produced by parsing or transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: u32,
    pub text: String,
}

/// Body of `parsed` and `transcript` artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentDocument {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedSegment {
    pub index: u32,
    pub source: String,
    pub text: String,
}

/// Body of `translation` artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedDocument {
    pub source_language: String,
    pub target_language: String,
    pub segments: Vec<TranslatedSegment>,
}
