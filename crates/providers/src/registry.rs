//! Provider registry and the gateway wrapper.
//!
//! The registry constructs all configured provider instances at startup
//! (skip-and-warn on bad entries). The [`Gateway`] layers agent→model
//! resolution, per-call timeouts, and bounded retries for transient
//! failure classes on top of the raw adapters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use rr_domain::agent::{AgentId, ProviderKind};
use rr_domain::chat::ChatMessage;
use rr_domain::config::LlmConfig;
use rr_domain::error::{Error, Result};
use rr_domain::stream::BoxStream;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::{GenerationParams, LlmProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated LLM providers, keyed by kind.
///
/// When a provider fails to initialize (usually a missing key env var) it
/// is recorded in `init_errors` and skipped; startup continues so the rest
/// of the installation keeps working.
pub struct ProviderRegistry {
    by_kind: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
    init_errors: Vec<ProviderInitError>,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub error: String,
}

/// Mask substrings that look like API keys in an error message so raw
/// secrets never leak into logs.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..]);
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// The first configured provider of each kind serves every agent bound
    /// to that kind.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut by_kind: HashMap<ProviderKind, Arc<dyn LlmProvider>> = HashMap::new();
        let mut init_errors: Vec<ProviderInitError> = Vec::new();

        for pc in &config.providers {
            let result: Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        "registered LLM provider"
                    );
                    by_kind.entry(pc.kind).or_insert(provider);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        error: safe_error,
                    });
                }
            }
        }

        Self {
            by_kind,
            init_errors,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn LlmProvider>> {
        self.by_kind.get(&kind).cloned()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The capability surface the workflow sees: structured completion and
/// token streaming per agent, with timeout and retry handled here.
pub struct Gateway {
    registry: ProviderRegistry,
    timeout: Duration,
    retries: u32,
    temperature: f32,
    max_tokens: u32,
}

impl Gateway {
    pub fn new(registry: ProviderRegistry, config: &LlmConfig) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(config.timeout_s),
            retries: config.retries,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolve an agent to its provider instance and model string.
    ///
    /// The agent table is constant; only provider availability can fail.
    fn resolve(&self, agent: AgentId) -> Result<(Arc<dyn LlmProvider>, GenerationParams)> {
        let spec = agent.spec();
        let provider = self.registry.get(spec.provider).ok_or_else(|| {
            Error::Config(format!(
                "no {:?} provider configured for agent '{agent}'",
                spec.provider
            ))
        })?;
        let params = GenerationParams {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            model: Some(spec.model.to_string()),
        };
        Ok((provider, params))
    }

    /// Structured completion for an agent, with per-call timeout and
    /// bounded exponential backoff for `network`, `timeout`, and
    /// `rate_limit` failures. Other classes surface immediately.
    pub async fn structured_complete(
        &self,
        agent: AgentId,
        messages: &[ChatMessage],
        schema: &Value,
    ) -> Result<Value> {
        let (provider, params) = self.resolve(agent)?;

        let mut attempt = 0u32;
        loop {
            let call = provider.structured_complete(messages, schema, &params);
            let result = match tokio::time::timeout(self.timeout, call).await {
                Ok(r) => r,
                Err(_) => Err(Error::Timeout(format!(
                    "structured completion exceeded {:?}",
                    self.timeout
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.class().is_retryable() && attempt + 1 < self.retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        agent = %agent,
                        class = %e.class(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient LLM failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Token streaming for an agent. Stream setup failures retry like
    /// structured calls; mid-stream errors surface to the consumer.
    pub async fn stream_tokens(
        &self,
        agent: AgentId,
        messages: &[ChatMessage],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let (provider, params) = self.resolve(agent)?;

        let mut attempt = 0u32;
        loop {
            let call = provider.stream_tokens(messages, &params);
            let result = match tokio::time::timeout(self.timeout, call).await {
                Ok(r) => r,
                Err(_) => Err(Error::Timeout(format!(
                    "stream setup exceeded {:?}",
                    self.timeout
                ))),
            };

            match result {
                Ok(stream) => return Ok(stream),
                Err(e) if e.class().is_retryable() && attempt + 1 < self.retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        agent = %agent,
                        class = %e.class(),
                        attempt,
                        "transient stream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff: 250ms, 500ms, 1s, 2s, capped at 4s.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = 250u64.saturating_mul(1 << attempt.min(4));
    Duration::from_millis(ms.min(4_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(250));
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(10), Duration::from_millis(4_000));
    }

    #[test]
    fn mask_secrets_hides_long_tokens() {
        let msg = "auth failed for key sk-ant-REDACTED";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz"));
        assert!(masked.contains("..."));
    }

    #[test]
    fn mask_secrets_keeps_short_words() {
        let msg = "connection refused to api.example.com";
        assert_eq!(mask_secrets(msg), msg);
    }

    #[test]
    fn empty_registry_reports_missing_provider() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default());
        assert!(registry.is_empty());
        let gateway = Gateway::new(registry, &LlmConfig::default());
        let err = gateway.resolve(AgentId::Ripple).unwrap_err();
        assert!(err.to_string().contains("no Anthropic provider"));
    }
}
