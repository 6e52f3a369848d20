use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Glossary;

use super::RepositoryError;

#[async_trait]
pub trait GlossaryRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Glossary>, RepositoryError>;
}
