use std::sync::Arc;

use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use common::{error::AppError, storage::types::pipeline_settings::PipelineSettings};
use tracing::debug;

use crate::prompt::{PromptMessage, PromptRole};

#[derive(Clone)]
pub struct CompletionProvider {
    inner: CompletionInner,
}

#[derive(Clone)]
enum CompletionInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
    },
    #[cfg(any(test, feature = "test-utils"))]
    Fixed {
        reply: Option<String>,
    },
}

impl CompletionProvider {
    pub fn new_openai(client: Arc<Client<async_openai::config::OpenAIConfig>>) -> Self {
        CompletionProvider {
            inner: CompletionInner::OpenAI { client },
        }
    }

    /// Sends the composed message list to the completion endpoint and returns
    /// the trimmed reply text. A non-success response or a response without a
    /// usable first choice is fatal for the request.
    pub async fn complete(
        &self,
        messages: &[PromptMessage],
        settings: &PipelineSettings,
    ) -> Result<String, AppError> {
        match &self.inner {
            CompletionInner::OpenAI { client } => {
                let request = create_chat_request(messages, settings)?;
                let response = client.chat().create(request).await?;

                let content = response
                    .choices
                    .first()
                    .and_then(|choice| choice.message.content.as_deref())
                    .ok_or_else(|| {
                        AppError::LLMParsing("No content found in completion response".into())
                    })?;

                let reply = content.trim();
                if reply.is_empty() {
                    return Err(AppError::LLMParsing(
                        "Completion response content was empty".into(),
                    ));
                }

                debug!(reply_chars = reply.chars().count(), "Completion received");

                Ok(reply.to_owned())
            }
            #[cfg(any(test, feature = "test-utils"))]
            CompletionInner::Fixed { reply } => reply.clone().ok_or_else(|| {
                AppError::LLMParsing("Completion backend scripted to fail".into())
            }),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl CompletionProvider {
    /// Offline backend returning a canned reply, or failing when `reply` is None.
    pub fn new_fixed(reply: Option<&str>) -> Self {
        CompletionProvider {
            inner: CompletionInner::Fixed {
                reply: reply.map(str::to_owned),
            },
        }
    }
}

pub fn create_chat_request(
    messages: &[PromptMessage],
    settings: &PipelineSettings,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let request_messages = messages
        .iter()
        .map(to_request_message)
        .collect::<Result<Vec<_>, _>>()?;

    CreateChatCompletionRequestArgs::default()
        .model(&settings.chat_model)
        .messages(request_messages)
        .max_tokens(settings.max_completion_tokens)
        .temperature(settings.temperature)
        .build()
}

fn to_request_message(
    message: &PromptMessage,
) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let request_message = match message.role {
        PromptRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        PromptRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        PromptRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
    };

    Ok(request_message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> PipelineSettings {
        PipelineSettings {
            id: "current".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            max_completion_tokens: 500,
            temperature: 0.7,
            persona_prompt: "persona".to_string(),
            embedding_backend: "hashed".to_string(),
            embedding_model: None,
            embedding_dimensions: 8,
        }
    }

    fn prompt(role: PromptRole, content: &str) -> PromptMessage {
        PromptMessage {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_create_chat_request_carries_all_messages() {
        let messages = vec![
            prompt(PromptRole::System, "persona"),
            prompt(PromptRole::User, "earlier question"),
            prompt(PromptRole::Assistant, "earlier answer"),
            prompt(PromptRole::User, "new question"),
        ];

        let request = create_chat_request(&messages, &test_settings()).expect("build request");

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_fixed_backend_returns_reply() {
        let provider = CompletionProvider::new_fixed(Some("canned answer"));

        let reply = provider
            .complete(&[prompt(PromptRole::User, "anything")], &test_settings())
            .await
            .expect("complete");

        assert_eq!(reply, "canned answer");
    }

    #[tokio::test]
    async fn test_fixed_backend_scripted_failure() {
        let provider = CompletionProvider::new_fixed(None);

        let result = provider
            .complete(&[prompt(PromptRole::User, "anything")], &test_settings())
            .await;

        match result {
            Err(AppError::LLMParsing(_)) => {}
            _ => panic!("Expected LLMParsing error"),
        }
    }
}
