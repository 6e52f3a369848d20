use async_trait::async_trait;

#[async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("unsupported language pair: {0}")]
    UnsupportedLanguagePair(String),
    #[error("translation failed: {0}")]
    TranslationFailed(String),
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
}
