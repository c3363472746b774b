use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use futures::try_join;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use common::{
    error::AppError,
    storage::types::{
        conversation::Conversation,
        message::{Message, MessageRole},
        pipeline_settings::PipelineSettings,
        profile::Profile,
    },
};
use context_pipeline::{compose, retrieve_context, HistoryTurn, RetrievalParams};

use crate::{api_state::ApiState, error::ApiError};

/// Longest title derived from the first words of a command.
const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, PartialEq)]
pub struct CommandRequest {
    pub message: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub history: Vec<HistoryTurn>,
    pub is_voice: bool,
}

impl CommandRequest {
    /// Field-by-field validation of the raw JSON body. Runs before any upstream
    /// call, so a bad request never costs an embedding or completion.
    fn from_value(payload: &Value) -> Result<Self, AppError> {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .ok_or_else(|| {
                AppError::Validation("message must be a non-empty string".to_string())
            })?
            .to_owned();

        let user_id = payload
            .get("userId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
            .ok_or_else(|| AppError::Validation("userId must be a non-empty string".to_string()))?
            .to_owned();

        let conversation_id = match payload.get("conversationId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => {
                return Err(AppError::Validation(
                    "conversationId must be a string".to_string(),
                ))
            }
        };

        let history = match payload.get("conversationHistory") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                AppError::Validation(format!("conversationHistory is malformed: {e}"))
            })?,
        };

        let is_voice = match payload.get("isVoice") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => return Err(AppError::Validation("isVoice must be a boolean".to_string())),
        };

        Ok(Self {
            message,
            user_id,
            conversation_id,
            history,
            is_voice,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    pub response: String,
    pub conversation_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<ExchangeEmbeddings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeEmbeddings {
    pub user_message: Vec<f32>,
    pub assistant_response: Option<Vec<f32>>,
}

/// One voice/text command, start to finish: validate, load profile and embed
/// the message concurrently, retrieve similar past messages, compose the
/// prompt, complete, then persist both sides of the exchange. Writes that
/// happened before a failure are left in place, there is no rollback.
pub async fn handle_command(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CommandResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))?;
    let request = CommandRequest::from_value(&payload)?;

    info!(
        user_id = %request.user_id,
        message_chars = request.message.chars().count(),
        history_turns = request.history.len(),
        has_conversation = request.conversation_id.is_some(),
        is_voice = request.is_voice,
        "Received command request"
    );

    let settings = PipelineSettings::get_current(&state.db).await?;

    // Profile load and message embedding have no data dependency
    let (profile, query_embedding) = try_join!(
        Profile::find_by_user_id(&request.user_id, &state.db),
        state.embedding.embed(&request.message)
    )?;

    let conversation = ensure_conversation(&state, &request).await?;

    let retrieved = retrieve_context(
        &state.db,
        &query_embedding,
        &request.user_id,
        RetrievalParams::default(),
    )
    .await?;

    let prompt = compose(
        &settings.persona_prompt,
        profile.as_ref(),
        &retrieved,
        &request.history,
        &request.message,
    );

    let reply = state.completion.complete(&prompt, &settings).await?;

    // Best effort only: losing this vector degrades future retrieval for this
    // one reply, not the current response.
    let reply_embedding = match state.embedding.embed(&reply).await {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!(error = %e, "Failed to embed assistant reply, persisting without embedding");
            None
        }
    };

    state
        .db
        .store_item(Message::new(
            conversation.id.clone(),
            MessageRole::User,
            request.message.clone(),
            request.is_voice,
            Some(query_embedding.clone()),
        ))
        .await
        .map_err(AppError::from)?;

    state
        .db
        .store_item(Message::new(
            conversation.id.clone(),
            MessageRole::Assistant,
            reply.clone(),
            false,
            reply_embedding.clone(),
        ))
        .await
        .map_err(AppError::from)?;

    Ok(Json(CommandResponse {
        success: true,
        response: reply,
        conversation_id: conversation.id,
        timestamp: Utc::now().to_rfc3339(),
        embeddings: Some(ExchangeEmbeddings {
            user_message: query_embedding,
            assistant_response: reply_embedding,
        }),
    }))
}

/// Reuses the caller's conversation after an ownership check, or starts a new
/// one titled from the command's leading words.
async fn ensure_conversation(
    state: &ApiState,
    request: &CommandRequest,
) -> Result<Conversation, AppError> {
    match &request.conversation_id {
        Some(conversation_id) => {
            Conversation::get_owned(conversation_id, &request.user_id, &state.db).await
        }
        None => {
            let conversation = Conversation::new(
                request.user_id.clone(),
                derive_title(&request.message),
            );
            state
                .db
                .store_item(conversation.clone())
                .await
                .map_err(AppError::from)?;
            Ok(conversation)
        }
    }
}

fn derive_title(message: &str) -> String {
    let mut title = String::new();
    for word in message.split_whitespace() {
        if title.chars().count() + word.chars().count() >= TITLE_MAX_CHARS {
            break;
        }
        if !title.is_empty() {
            title.push(' ');
        }
        title.push_str(word);
    }
    if title.is_empty() {
        "New conversation".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_pipeline::HistoryRole;
    use serde_json::json;

    #[test]
    fn test_valid_payload_with_defaults() {
        let payload = json!({
            "message": "What's on my schedule today?",
            "userId": "user_1"
        });

        let request = CommandRequest::from_value(&payload).expect("should validate");

        assert_eq!(request.message, "What's on my schedule today?");
        assert_eq!(request.user_id, "user_1");
        assert_eq!(request.conversation_id, None);
        assert!(request.history.is_empty());
        assert!(request.is_voice);
    }

    #[test]
    fn test_valid_payload_with_all_fields() {
        let payload = json!({
            "message": "and tomorrow?",
            "userId": "user_1",
            "conversationId": "conv_1",
            "conversationHistory": [
                {"role": "user", "content": "What's on my schedule today?"},
                {"role": "assistant", "content": "You have a dentist appointment at noon."}
            ],
            "isVoice": false
        });

        let request = CommandRequest::from_value(&payload).expect("should validate");

        assert_eq!(request.conversation_id.as_deref(), Some("conv_1"));
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[0].role, HistoryRole::User);
        assert_eq!(request.history[1].role, HistoryRole::Assistant);
        assert!(!request.is_voice);
    }

    #[test]
    fn test_missing_message_is_rejected() {
        let payload = json!({ "userId": "user_1" });

        match CommandRequest::from_value(&payload) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("message")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let payload = json!({ "message": "   ", "userId": "user_1" });

        assert!(matches!(
            CommandRequest::from_value(&payload),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_non_string_message_is_rejected() {
        let payload = json!({ "message": 42, "userId": "user_1" });

        assert!(matches!(
            CommandRequest::from_value(&payload),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_user_id_is_rejected() {
        let payload = json!({ "message": "hello" });

        match CommandRequest::from_value(&payload) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("userId")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_malformed_history_is_rejected() {
        let payload = json!({
            "message": "hello",
            "userId": "user_1",
            "conversationHistory": [{"role": "narrator", "content": "meanwhile"}]
        });

        match CommandRequest::from_value(&payload) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("conversationHistory")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_non_bool_is_voice_is_rejected() {
        let payload = json!({ "message": "hello", "userId": "user_1", "isVoice": "yes" });

        assert!(matches!(
            CommandRequest::from_value(&payload),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_derive_title_takes_leading_words() {
        assert_eq!(derive_title("remind me to call mom"), "remind me to call mom");

        let long = "word ".repeat(40);
        assert!(derive_title(&long).chars().count() <= TITLE_MAX_CHARS);
    }
}
