use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::ports::{
    BlobStore, GlossaryRepository, JobRepository, StageError, StageOutput, StageProcessor,
    TranslationEngine, WorkRequest,
};
use crate::domain::{
    ArtifactType, GlossaryProtector, NewArtifact, ObjectKey, SegmentDocument, Stage,
    TranslatedDocument, TranslatedSegment,
};

/// Translates one file into one target language, honouring the job's glossary.
pub struct TranslationStage<E> {
    engine: Arc<E>,
    repository: Arc<dyn JobRepository>,
    glossaries: Arc<dyn GlossaryRepository>,
    store: Arc<dyn BlobStore>,
}

impl<E: TranslationEngine> TranslationStage<E> {
    pub fn new(
        engine: Arc<E>,
        repository: Arc<dyn JobRepository>,
        glossaries: Arc<dyn GlossaryRepository>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            engine,
            repository,
            glossaries,
            store,
        }
    }

    async fn protector(&self, glossary_id: Option<Uuid>) -> Result<GlossaryProtector, StageError> {
        let Some(id) = glossary_id else {
            return Ok(GlossaryProtector::default());
        };
        match self.glossaries.get(id).await? {
            Some(glossary) => Ok(GlossaryProtector::new(&glossary.terms)),
            None => {
                debug!(glossary_id = %id, "Glossary not found, translating without it");
                Ok(GlossaryProtector::default())
            }
        }
    }

    async fn translate_segment(
        &self,
        protector: &GlossaryProtector,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, StageError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let protected = protector.protect(text);
        let translated = self.engine.translate(&protected, source, target).await?;
        Ok(protector.restore(&translated))
    }
}

#[async_trait]
impl<E: TranslationEngine> StageProcessor for TranslationStage<E> {
    fn stage(&self) -> Stage {
        Stage::Translating
    }

    #[instrument(skip_all, fields(job_id = %request.job_id))]
    async fn process(&self, request: &WorkRequest) -> Result<StageOutput, StageError> {
        let file_id = request
            .file_id
            .ok_or_else(|| StageError::InvalidRequest("missing file_id".to_string()))?;
        let target = request
            .target_language
            .as_deref()
            .ok_or_else(|| StageError::InvalidRequest("missing target_language".to_string()))?;

        let job = self
            .repository
            .get_job(request.job_id)
            .await?
            .ok_or_else(|| StageError::Transient(format!("job {} not visible", request.job_id)))?;
        let file = self
            .repository
            .get_file(file_id)
            .await?
            .ok_or_else(|| StageError::MissingInput(format!("file {}", file_id)))?;

        let input_type = if file.media_type.requires_transcription() {
            ArtifactType::Transcript
        } else {
            ArtifactType::Parsed
        };
        let input = self
            .repository
            .latest_artifact(file.id, input_type, None)
            .await?
            .ok_or_else(|| {
                StageError::MissingInput(format!("no {} artifact for file {}", input_type, file.id))
            })?;

        let raw = self.store.get(&input.object_key).await?;
        let document: SegmentDocument = serde_json::from_slice(&raw).map_err(|e| {
            StageError::Processing(format!("unreadable {}: {}", input.object_key, e))
        })?;

        let source = request
            .source_language
            .clone()
            .unwrap_or_else(|| job.source_language.clone());
        let glossary_id = request
            .message
            .get_str("glossary_id")
            .and_then(|raw| Uuid::parse_str(&raw).ok())
            .or_else(|| job.settings.glossary_id());
        let protector = self.protector(glossary_id).await?;

        let mut segments = Vec::with_capacity(document.segments.len());
        for segment in document.segments {
            let text = self
                .translate_segment(&protector, &segment.text, &source, target)
                .await?;
            segments.push(TranslatedSegment {
                index: segment.index,
                source: segment.text,
                text,
            });
        }
        let segment_count = segments.len() as u64;

        let translated = TranslatedDocument {
            source_language: source,
            target_language: target.to_string(),
            segments,
        };
        let body = serde_json::to_vec_pretty(&translated)
            .map_err(|e| StageError::Processing(e.to_string()))?;

        let key = ObjectKey::translation(job.id, file.id, target, &request.request_id);
        self.store.put(&key, Bytes::from(body)).await?;

        Ok(StageOutput::default()
            .with_artifact(
                NewArtifact::new(job.id, file.id, ArtifactType::Translation, key.clone())
                    .with_language(target),
            )
            .with_result("translated_object_key", key.as_str())
            .with_result("segment_count", segment_count))
    }
}
