//! Siumai-backed model providers (`openai`, `anthropic`, `ollama`).

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use siumai::prelude::*;
use tracing::debug;

use cadenza_core::error::{CadenzaError, Result};
use cadenza_core::message::{MessageRole, ModelMessage};

use super::{
    Generation, GenerationRequest, ModelConfig, ModelHandle, ModelProvider, TokenChunk,
    TokenStream, TokenUsage,
};

/// Which siumai backend a provider instance drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    OpenAi,
    Anthropic,
    Ollama,
}

/// Model provider backed by the siumai multi-provider client.
#[derive(Debug, Clone)]
pub struct SiumaiProvider {
    backend: Backend,
}

impl SiumaiProvider {
    /// Create the `openai` provider.
    #[must_use]
    pub fn openai() -> Self {
        Self {
            backend: Backend::OpenAi,
        }
    }

    /// Create the `anthropic` provider.
    #[must_use]
    pub fn anthropic() -> Self {
        Self {
            backend: Backend::Anthropic,
        }
    }

    /// Create the `ollama` provider.
    #[must_use]
    pub fn ollama() -> Self {
        Self {
            backend: Backend::Ollama,
        }
    }

    fn default_model(&self) -> &'static str {
        match self.backend {
            Backend::OpenAi => "gpt-4o-mini",
            Backend::Anthropic => "claude-3-5-sonnet-20241022",
            Backend::Ollama => "llama3.2",
        }
    }

    fn resolve_api_key(&self, config: &ModelConfig) -> Result<String> {
        if let Some(key) = &config.api_key {
            return Ok(key.clone());
        }
        let env_var = match self.backend {
            Backend::OpenAi => "OPENAI_API_KEY",
            Backend::Anthropic => "ANTHROPIC_API_KEY",
            Backend::Ollama => return Ok(String::new()),
        };
        std::env::var(env_var).map_err(|_| {
            CadenzaError::provider(
                self.name(),
                format!("no API key in step config and {env_var} is not set"),
            )
        })
    }

    /// Validate configuration before constructing a client.
    fn validate_config(&self, config: &ModelConfig) -> Result<()> {
        if let Some(temperature) = config.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(CadenzaError::validation(
                    "temperature",
                    "temperature must be between 0.0 and 2.0",
                ));
            }
        }
        if let Some(max_tokens) = config.max_tokens {
            if max_tokens == 0 {
                return Err(CadenzaError::validation(
                    "maxTokens",
                    "maxTokens must be greater than 0",
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ModelProvider for SiumaiProvider {
    fn name(&self) -> &str {
        match self.backend {
            Backend::OpenAi => "openai",
            Backend::Anthropic => "anthropic",
            Backend::Ollama => "ollama",
        }
    }

    async fn create_model(&self, config: &ModelConfig) -> Result<Arc<dyn ModelHandle>> {
        self.validate_config(config)?;

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| self.default_model().to_string());
        debug!("Creating {} model: {}", self.name(), model);

        let client = match self.backend {
            Backend::OpenAi => {
                let api_key = self.resolve_api_key(config)?;
                let mut builder = Siumai::builder().openai().api_key(api_key).model(&model);
                if let Some(temperature) = config.temperature {
                    builder = builder.temperature(temperature);
                }
                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                builder.build().await.map_err(|e| {
                    CadenzaError::provider(self.name(), format!("failed to create client: {e}"))
                })?
            }
            Backend::Anthropic => {
                let api_key = self.resolve_api_key(config)?;
                let mut builder = Siumai::builder().anthropic().api_key(api_key).model(&model);
                if let Some(temperature) = config.temperature {
                    builder = builder.temperature(temperature);
                }
                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }
                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }
                builder.build().await.map_err(|e| {
                    CadenzaError::provider(self.name(), format!("failed to create client: {e}"))
                })?
            }
            Backend::Ollama => {
                let base_url = config.base_url.clone().unwrap_or_else(|| {
                    std::env::var("OLLAMA_BASE_URL")
                        .unwrap_or_else(|_| "http://localhost:11434".to_string())
                });
                let mut builder = Siumai::builder().ollama().base_url(base_url).model(&model);
                if let Some(temperature) = config.temperature {
                    builder = builder.temperature(temperature);
                }
                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }
                builder.build().await.map_err(|e| {
                    CadenzaError::provider(self.name(), format!("failed to create client: {e}"))
                })?
            }
        };

        Ok(Arc::new(SiumaiModel {
            client,
            provider: self.name().to_string(),
        }))
    }
}

/// A configured siumai client session.
struct SiumaiModel {
    client: Siumai,
    provider: String,
}

impl SiumaiModel {
    fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = &request.system {
            messages.push(ChatMessage::system(system).build());
        }

        for message in &request.messages {
            let built = match message.role {
                MessageRole::User => ChatMessage::user(&message.content).build(),
                MessageRole::Assistant => ChatMessage::assistant(&message.content).build(),
                MessageRole::System => ChatMessage::system(&message.content).build(),
                // Tool results ride along as user turns in the text protocol.
                MessageRole::Tool => ChatMessage::user(&message.content).build(),
            };
            messages.push(built);
        }

        messages
    }

    fn convert_usage(usage: Option<&siumai::types::Usage>) -> TokenUsage {
        usage.map_or_else(TokenUsage::default, |usage| TokenUsage {
            prompt_tokens: usage.prompt_tokens as u64,
            completion_tokens: usage.completion_tokens as u64,
            total_tokens: usage.total_tokens as u64,
        })
    }
}

#[async_trait]
impl ModelHandle for SiumaiModel {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let messages = Self::build_messages(&request);

        let response = self.client.chat(messages).await.map_err(|e| {
            CadenzaError::provider(&self.provider, format!("generation failed: {e}"))
        })?;

        Ok(Generation {
            text: response.content.all_text(),
            usage: Self::convert_usage(response.usage.as_ref()),
        })
    }

    async fn stream(&self, request: GenerationRequest) -> Result<TokenStream> {
        let messages = Self::build_messages(&request);
        let provider = self.provider.clone();

        let stream = self.client.chat_stream(messages, None).await.map_err(|e| {
            CadenzaError::provider(&self.provider, format!("failed to start stream: {e}"))
        })?;

        let mapped = stream.filter_map(move |chunk| {
            let provider = provider.clone();
            async move {
                match chunk {
                    Ok(siumai::types::ChatStreamEvent::ContentDelta { delta, .. }) => {
                        Some(Ok(TokenChunk::Delta(delta)))
                    }
                    Ok(siumai::types::ChatStreamEvent::StreamEnd { response }) => {
                        Some(Ok(TokenChunk::Done {
                            usage: Self::convert_usage(response.usage.as_ref()),
                        }))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(CadenzaError::provider(
                        provider,
                        format!("stream error: {e}"),
                    ))),
                }
            }
        });

        Ok(Box::pin(mapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(SiumaiProvider::openai().name(), "openai");
        assert_eq!(SiumaiProvider::anthropic().name(), "anthropic");
        assert_eq!(SiumaiProvider::ollama().name(), "ollama");
    }

    #[test]
    fn test_default_models() {
        assert_eq!(SiumaiProvider::openai().default_model(), "gpt-4o-mini");
        assert_eq!(SiumaiProvider::ollama().default_model(), "llama3.2");
    }

    #[test]
    fn test_validate_config_temperature_range() {
        let provider = SiumaiProvider::ollama();
        let config = ModelConfig {
            temperature: Some(3.0),
            ..ModelConfig::default()
        };
        let err = provider.validate_config(&config).unwrap_err();
        assert!(matches!(err, CadenzaError::Validation { .. }));
    }

    #[test]
    fn test_validate_config_zero_max_tokens() {
        let provider = SiumaiProvider::ollama();
        let config = ModelConfig {
            max_tokens: Some(0),
            ..ModelConfig::default()
        };
        assert!(provider.validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_api_key_is_a_provider_error() {
        std::env::remove_var("OPENAI_API_KEY");
        let provider = SiumaiProvider::openai();
        let err = provider.resolve_api_key(&ModelConfig::default()).unwrap_err();
        assert!(matches!(err, CadenzaError::Provider { .. }));
        assert!(format!("{err}").contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_ollama_needs_no_api_key() {
        let provider = SiumaiProvider::ollama();
        assert_eq!(
            provider.resolve_api_key(&ModelConfig::default()).unwrap(),
            ""
        );
    }

    #[test]
    fn test_build_messages_includes_system_first() {
        let request = GenerationRequest {
            system: Some("be terse".to_string()),
            messages: vec![ModelMessage::user("hi")],
        };
        let messages = SiumaiModel::build_messages(&request);
        assert_eq!(messages.len(), 2);
    }
}
