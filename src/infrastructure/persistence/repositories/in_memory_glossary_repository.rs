use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::ports::{GlossaryRepository, RepositoryError};
use crate::domain::Glossary;

#[derive(Default)]
pub struct InMemoryGlossaryRepository {
    glossaries: RwLock<HashMap<Uuid, Glossary>>,
}

impl InMemoryGlossaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, glossary: Glossary) {
        self.glossaries.write().await.insert(glossary.id, glossary);
    }
}

#[async_trait]
impl GlossaryRepository for InMemoryGlossaryRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Glossary>, RepositoryError> {
        Ok(self.glossaries.read().await.get(&id).cloned())
    }
}
