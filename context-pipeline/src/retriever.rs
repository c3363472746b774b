use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{conversation::Conversation, message::Message, StoredObject},
    },
};
use serde::Deserialize;
use tracing::debug;

/// Tuning for the similarity search. The defaults are the pipeline's contract:
/// keep matches scoring at least 0.7 and hand at most 5 of them to the prompt.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    pub threshold: f32,
    pub limit: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            limit: 5,
        }
    }
}

/// One retrieved snippet of past conversation, alive for a single request.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RetrievedContextItem {
    pub content: String,
    pub similarity: f32,
}

/// Ranks stored message embeddings against the query vector by cosine
/// similarity, scoped to conversations owned by `user_id`. Messages without an
/// embedding never participate. An empty result is a normal outcome and simply
/// means no extra context gets injected.
pub async fn retrieve_context(
    db: &SurrealDbClient,
    query_vector: &[f32],
    user_id: &str,
    params: RetrievalParams,
) -> Result<Vec<RetrievedContextItem>, AppError> {
    let query = format!(
        "SELECT * FROM (
            SELECT content, vector::similarity::cosine(embedding, $query_vector) AS similarity
            FROM type::table($message_table)
            WHERE embedding != NONE
                AND conversation_id IN (
                    SELECT VALUE record::id(id) FROM type::table($conversation_table)
                    WHERE user_id = $user_id
                )
        ) WHERE similarity >= $threshold ORDER BY similarity DESC LIMIT {}",
        params.limit
    );

    let items: Vec<RetrievedContextItem> = db
        .client
        .query(query)
        .bind(("message_table", Message::table_name()))
        .bind(("conversation_table", Conversation::table_name()))
        .bind(("query_vector", query_vector.to_vec()))
        .bind(("user_id", user_id.to_string()))
        .bind(("threshold", params.threshold))
        .await?
        .take(0)?;

    debug!(
        %user_id,
        matches = items.len(),
        threshold = params.threshold,
        "Context retrieval finished"
    );

    Ok(items)
}
