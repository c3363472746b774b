#![allow(clippy::module_name_repetitions)]
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object, utils::embedding::EmbeddingProvider};

#[derive(Deserialize, Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

stored_object!(Message, "message", {
    conversation_id: String,
    role: MessageRole,
    content: String,
    is_voice: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    embedding: Option<Vec<f32>>
});

impl Message {
    pub fn new(
        conversation_id: String,
        role: MessageRole,
        content: String,
        is_voice: bool,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            conversation_id,
            role,
            content,
            is_voice,
            embedding,
        }
    }

    /// All messages of one conversation in the order they were written.
    pub async fn list_for_conversation(
        conversation_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let messages: Vec<Self> = db
            .client
            .query("SELECT * FROM type::table($table_name) WHERE conversation_id = $conversation_id ORDER BY created_at")
            .bind(("table_name", Self::table_name()))
            .bind(("conversation_id", conversation_id.to_string()))
            .await?
            .take(0)?;

        Ok(messages)
    }

    /// Regenerates every stored message embedding with the given provider.
    ///
    /// Run when the embedding dimension changes; otherwise stored vectors would no
    /// longer be comparable with fresh query vectors. A message whose re-embedding
    /// fails has its stale vector cleared so it only drops out of retrieval.
    pub async fn update_all_embeddings(
        db: &SurrealDbClient,
        embedding: &EmbeddingProvider,
    ) -> Result<(), AppError> {
        let messages: Vec<Self> = db.get_all_stored_items().await?;
        let total = messages.iter().filter(|m| m.embedding.is_some()).count();
        if total == 0 {
            info!("No message embeddings to refresh");
            return Ok(());
        }
        info!(total, "Re-embedding stored messages");

        let mut failed = 0usize;
        for message in messages.into_iter().filter(|m| m.embedding.is_some()) {
            match embedding.embed(&message.content).await {
                Ok(vector) => {
                    db.client
                        .query("UPDATE type::thing($table_name, $id) SET embedding = $embedding, updated_at = time::now()")
                        .bind(("table_name", Self::table_name()))
                        .bind(("id", message.id.clone()))
                        .bind(("embedding", vector))
                        .await?;
                }
                Err(e) => {
                    failed = failed.saturating_add(1);
                    warn!(message_id = %message.id, error = %e, "Failed to re-embed message, clearing stale embedding");
                    db.client
                        .query("UPDATE type::thing($table_name, $id) SET embedding = NONE, updated_at = time::now()")
                        .bind(("table_name", Self::table_name()))
                        .bind(("id", message.id.clone()))
                        .await?;
                }
            }
        }

        if failed > 0 {
            warn!(failed, "Some messages lost their embedding during the refresh");
        }

        Ok(())
    }
}
