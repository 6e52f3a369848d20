use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{GlossaryRepository, RepositoryError};
use crate::domain::Glossary;

use super::rows::query_error;

pub struct PgGlossaryRepository {
    pool: PgPool,
}

impl PgGlossaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, glossary: &Glossary) -> Result<(), RepositoryError> {
        let terms = serde_json::to_value(&glossary.terms)
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
        sqlx::query(
            "INSERT INTO glossaries (id, name, language_pair, terms) VALUES ($1, $2, $3, $4)",
        )
        .bind(glossary.id)
        .bind(&glossary.name)
        .bind(&glossary.language_pair)
        .bind(terms)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }
}

#[async_trait]
impl GlossaryRepository for PgGlossaryRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Glossary>, RepositoryError> {
        let row: Option<(Uuid, String, String, serde_json::Value)> =
            sqlx::query_as("SELECT id, name, language_pair, terms FROM glossaries WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

        row.map(|(id, name, language_pair, terms)| {
            let terms = serde_json::from_value(terms)
                .map_err(|e| RepositoryError::QueryFailed(format!("glossary {}: {}", id, e)))?;
            Ok(Glossary {
                id,
                name,
                language_pair,
                terms,
            })
        })
        .transpose()
    }
}
