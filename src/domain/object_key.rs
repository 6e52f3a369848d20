use std::fmt;

use uuid::Uuid;

use super::{FileId, JobId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn upload(upload_id: Uuid, filename: &str) -> Self {
        Self(format!("uploads/{}/{}", upload_id, sanitize_filename(filename)))
    }

    /// Stage outputs are keyed by the producing request, so a rerun writes
    /// beside its predecessor instead of over it.
    pub fn parsed(job_id: JobId, file_id: FileId, run: &str) -> Self {
        Self(format!(
            "parsed/{}/{}/{}.json",
            job_id.as_uuid(),
            file_id.as_uuid(),
            sanitize_segment(run)
        ))
    }

    pub fn transcript(job_id: JobId, file_id: FileId, run: &str) -> Self {
        Self(format!(
            "transcripts/{}/{}/{}.json",
            job_id.as_uuid(),
            file_id.as_uuid(),
            sanitize_segment(run)
        ))
    }

    pub fn translation(job_id: JobId, file_id: FileId, language: &str, run: &str) -> Self {
        Self(format!(
            "translations/{}/{}_{}/{}.json",
            job_id.as_uuid(),
            file_id.as_uuid(),
            sanitize_segment(language),
            sanitize_segment(run)
        ))
    }

    pub fn deliverable(job_id: JobId, filename: &str) -> Self {
        Self(format!(
            "final/{}/{}",
            job_id.as_uuid(),
            sanitize_filename(filename)
        ))
    }

    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn sanitize_filename(filename: &str) -> String {
    let name: String = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    if name.is_empty() || name == "." || name == ".." {
        "unnamed".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reruns_of_a_stage_get_distinct_keys() {
        let (job, file) = (JobId::new(), FileId::new());
        let first = ObjectKey::translation(job, file, "es", "run-1");
        let second = ObjectKey::translation(job, file, "es", "run-2");
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("translations/"));
    }

    #[test]
    fn run_ids_cannot_escape_their_prefix() {
        let key = ObjectKey::parsed(JobId::new(), FileId::new(), "../../etc");
        assert!(key.as_str().ends_with("/.._.._etc.json"));
    }
}
