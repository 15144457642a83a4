//! Model provider abstraction for the `llm` and `chat` primitives.
//!
//! A [`ModelProvider`] is a factory registered by name; it produces
//! [`ModelHandle`]s configured per step. Model sessions are constructed per
//! step; pooling is a provider concern, not an engine concern.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use cadenza_core::error::Result;
use cadenza_core::message::ModelMessage;

pub mod siumai;

pub use self::siumai::SiumaiProvider;

/// Per-step model configuration assembled from handler config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name (provider default applies when absent)
    #[serde(default)]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, rename = "maxTokens")]
    pub max_tokens: Option<u32>,

    /// API key override (providers fall back to their environment variable)
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,

    /// Base URL override for custom endpoints
    #[serde(default, rename = "baseUrl")]
    pub base_url: Option<String>,
}

/// One generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Optional system instructions
    pub system: Option<String>,
    /// Conversation in the model-message shape
    pub messages: Vec<ModelMessage>,
}

/// Token accounting for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens produced by the completion
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Sum two usage records.
    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

/// A completed non-streaming generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text
    pub text: String,
    /// Token usage
    pub usage: TokenUsage,
}

/// One chunk of a streaming generation.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenChunk {
    /// Incremental text content
    Delta(String),
    /// Stream completed, with final accounting
    Done {
        /// Token usage for the whole generation
        usage: TokenUsage,
    },
}

/// A boxed stream of generation chunks.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<TokenChunk>> + Send>>;

/// Factory producing configured model handles; registered by provider name.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// The name this provider registers under.
    fn name(&self) -> &str;

    /// Create a model handle for one step's configuration.
    async fn create_model(&self, config: &ModelConfig) -> Result<Arc<dyn ModelHandle>>;
}

/// A configured model session.
#[async_trait]
pub trait ModelHandle: Send + Sync {
    /// Execute a single non-streaming generation.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation>;

    /// Begin a streaming generation.
    async fn stream(&self, request: GenerationRequest) -> Result<TokenStream>;
}
