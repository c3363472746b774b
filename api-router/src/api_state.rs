use std::sync::Arc;

use common::{
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use context_pipeline::CompletionProvider;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub embedding: Arc<EmbeddingProvider>,
    pub completion: Arc<CompletionProvider>,
}

impl ApiState {
    pub fn new(
        config: &AppConfig,
        db: Arc<SurrealDbClient>,
        embedding: Arc<EmbeddingProvider>,
        completion: Arc<CompletionProvider>,
    ) -> Self {
        Self {
            db,
            config: config.clone(),
            embedding,
            completion,
        }
    }
}
