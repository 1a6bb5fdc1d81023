//! Chat model access for answer generation.

use crate::config::Settings;
use crate::error::{ParleyError, Result};
use crate::openai::create_client_from_settings;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

/// A single-turn prompt for the chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Trait for answer generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a complete answer.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Generate an answer, passing each token to `on_token` as it arrives.
    /// Returns the full answer.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<String> {
        let answer = self.generate(request).await?;
        on_token(&answer);
        Ok(answer)
    }

    /// Model identifier, for display.
    fn model(&self) -> &str;
}

/// OpenAI chat completions generator.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIGenerator {
    /// Create a generator for `model` using the configured client.
    pub fn from_settings(settings: &Settings, model: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: create_client_from_settings(&settings.openai)?,
            model: model.unwrap_or(&settings.rag.model).to_string(),
        })
    }

    fn build_request(&self, request: &GenerationRequest, stream: bool) -> Result<CreateChatCompletionRequest> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| ParleyError::Rag(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user.clone())
                .build()
                .map_err(|e| ParleyError::Rag(e.to_string()))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .stream(stream)
            .build()
            .map_err(|e| ParleyError::Rag(e.to_string()))
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let request = self.build_request(request, false)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            ParleyError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ParleyError::Rag("Empty response from LLM".to_string()))
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<String> {
        let request = self.build_request(request, true)?;

        let mut stream = self.client.chat().create_stream(request).await.map_err(|e| {
            ParleyError::OpenAI(format!("Failed to start response stream: {}", e))
        })?;

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ParleyError::OpenAI(format!("Response stream failed: {}", e)))?;
            for choice in chunk.choices {
                if let Some(token) = choice.delta.content {
                    on_token(&token);
                    answer.push_str(&token);
                }
            }
        }

        debug!("Streamed {} characters", answer.len());
        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
