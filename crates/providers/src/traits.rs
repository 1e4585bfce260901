use rr_domain::chat::ChatMessage;
use rr_domain::error::Result;
use rr_domain::stream::BoxStream;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sampling parameters for one generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every LLM adapter must implement.
///
/// Implementations are provider-specific adapters (Anthropic,
/// OpenAI-compatible) that translate between our internal types and the
/// wire format of each provider's HTTP API.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    /// Request a completion constrained to `schema` (a JSON Schema object)
    /// and return the parsed value.
    async fn structured_complete(
        &self,
        messages: &[ChatMessage],
        schema: &Value,
        params: &GenerationParams,
    ) -> Result<Value>;

    /// Request a plain completion and return a lazy stream of text tokens.
    async fn stream_tokens(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<BoxStream<'static, Result<String>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
