use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use common::storage::types::{
    conversation::Conversation,
    message::{Message, MessageRole},
};

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessagesParams {
    pub user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView {
    id: String,
    role: MessageRole,
    content: String,
    is_voice: bool,
    created_at: String,
}

/// Ordered read of one owned conversation. Embeddings stay server-side.
pub async fn get_conversation_messages(
    State(state): State<ApiState>,
    Path(conversation_id): Path<String>,
    Query(params): Query<ConversationMessagesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = Conversation::get_owned(&conversation_id, &params.user_id, &state.db).await?;
    let messages = Message::list_for_conversation(&conversation.id, &state.db).await?;

    let views: Vec<MessageView> = messages
        .into_iter()
        .map(|message| MessageView {
            id: message.id,
            role: message.role,
            content: message.content,
            is_voice: message.is_voice,
            created_at: message.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "conversationId": conversation.id,
        "title": conversation.title,
        "lastMessageAt": conversation.last_message_at.map(|at| at.to_rfc3339()),
        "messages": views,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
