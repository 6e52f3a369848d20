use super::{JobId, JobSettings, JobStatus, Priority};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub priority: Priority,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub settings: JobSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Builds a job in `CREATED`. Repeated target languages are collapsed,
    /// keeping the first occurrence so the fan-out order stays stable.
    pub fn new(
        source_language: String,
        target_languages: Vec<String>,
        priority: Priority,
        settings: JobSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Created,
            priority,
            source_language,
            target_languages: dedup_languages(target_languages),
            settings,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

fn dedup_languages(languages: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(languages.len());
    for lang in languages {
        let lang = lang.trim().to_string();
        if !lang.is_empty() && !seen.contains(&lang) {
            seen.push(lang);
        }
    }
    seen
}
