use crate::storage::types::message::deserialize_flexible_id;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError, storage::db::SurrealDbClient, utils::embedding::EmbeddingProvider,
};

/// Singleton record holding the models and prompt the pipeline runs with.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineSettings {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub chat_model: String,
    pub max_completion_tokens: u32,
    pub temperature: f32,
    pub persona_prompt: String,
    pub embedding_backend: String,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: u32,
}

impl PipelineSettings {
    /// Creates the settings record on first start, and afterwards keeps its
    /// embedding fields in line with the configured provider. Returns the
    /// settings plus whether the stored embedding dimension changed, which
    /// means previously stored vectors need to be regenerated.
    pub async fn sync_with_embedding(
        db: &SurrealDbClient,
        embedding: &EmbeddingProvider,
    ) -> Result<(Self, bool), AppError> {
        let existing: Option<Self> = db.select(("pipeline_settings", "current")).await?;

        let Some(mut settings) = existing else {
            let created: Option<Self> = db
                .create(("pipeline_settings", "current"))
                .content(Self {
                    id: "current".to_string(),
                    chat_model: "gpt-4o-mini".to_string(),
                    max_completion_tokens: 500,
                    temperature: 0.7,
                    persona_prompt:
                        crate::storage::types::system_prompts::DEFAULT_PERSONA_PROMPT.to_string(),
                    embedding_backend: embedding.backend_label().to_string(),
                    embedding_model: embedding.model_code(),
                    embedding_dimensions: embedding.dimension() as u32,
                })
                .await?;

            return created
                .map(|settings| (settings, false))
                .ok_or_else(|| AppError::Config("Failed to initialize pipeline settings".into()));
        };

        let dimensions_changed = settings.embedding_dimensions as usize != embedding.dimension();

        settings.embedding_backend = embedding.backend_label().to_string();
        settings.embedding_model = embedding.model_code();
        settings.embedding_dimensions = embedding.dimension() as u32;

        let updated: Option<Self> = db
            .update(("pipeline_settings", "current"))
            .content(settings)
            .await?;

        updated
            .map(|settings| (settings, dimensions_changed))
            .ok_or_else(|| AppError::Config("Failed to update pipeline settings".into()))
    }

    pub async fn get_current(db: &SurrealDbClient) -> Result<Self, AppError> {
        let settings: Option<Self> = db
            .client
            .query("SELECT * FROM type::thing('pipeline_settings', 'current')")
            .await?
            .take(0)?;

        settings.ok_or(AppError::NotFound("Pipeline settings not found".into()))
    }
}
