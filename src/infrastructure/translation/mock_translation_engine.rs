use crate::application::ports::{TranslationEngine, TranslationError};

/// Tags text with the target language instead of translating it.
/// Sentinel-wrapped glossary terms pass through untouched.
pub struct MockTranslationEngine;

#[async_trait::async_trait]
impl TranslationEngine for MockTranslationEngine {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        if source_language == target_language {
            return Err(TranslationError::UnsupportedLanguagePair(format!(
                "{}->{}",
                source_language, target_language
            )));
        }
        Ok(format!("[{}] {}", target_language, text))
    }
}
