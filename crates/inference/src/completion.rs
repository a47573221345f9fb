use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use ci_analyzer_core::config::AiConfig;

/// A single prompt-in, text-out generative call.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat completion against an OpenAI-compatible endpoint.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Self {
        let mut openai = OpenAIConfig::new().with_api_key(config.api_key.clone());
        if let Some(api_base) = &config.api_base {
            openai = openai.with_api_base(api_base.clone());
        }
        Self { client: Client::with_config(openai), model: config.model.clone() }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .context("Failed to build completion message")?
            .into();
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(vec![message])
            .build()
            .context("Failed to build completion request")?;
        let response =
            self.client.chat().create(request).await.context("Completion request failed")?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                "Completion used {} prompt + {} completion tokens",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Completion returned no content")
    }
}
