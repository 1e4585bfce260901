//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, and any other endpoint that follows the
//! chat completions contract. Structured completion uses
//! `response_format: json_schema` and parses the message content as JSON.

use crate::sse::sse_token_stream;
use crate::traits::{GenerationParams, LlmProvider};
use crate::util::{from_reqwest, provider_error, resolve_api_key};
use rr_domain::chat::{ChatMessage, Role};
use rr_domain::config::ProviderConfig;
use rr_domain::error::{Error, Result};
use rr_domain::stream::BoxStream;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl OpenAiCompatProvider {
    /// Create a new provider from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.key_env)?;
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o".into());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn build_chat_body(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> Value {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": role_to_str(m.role),
                    "content": m.content,
                })
            })
            .collect();

        let model = params
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "stream": stream,
        });

        if let Some(temp) = params.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = params.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }

        body
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pull the first choice's message content and parse it as JSON.
fn extract_structured_content(body: &Value) -> Result<Value> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ModelOutput("response has no message content".into()))?;

    serde_json::from_str(content)
        .map_err(|e| Error::ModelOutput(format!("content is not valid JSON: {e}")))
}

/// Parse a single chat-completions SSE data payload into text tokens.
fn parse_openai_sse(data: &str) -> Vec<Result<String>> {
    if data == "[DONE]" {
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let text = v
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|t| t.as_str());

    match text {
        Some(t) if !t.is_empty() => vec![Ok(t.to_string())],
        _ => Vec::new(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn structured_complete(
        &self,
        messages: &[ChatMessage],
        schema: &Value,
        params: &GenerationParams,
    ) -> Result<Value> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut body = self.build_chat_body(messages, params, false);
        body["response_format"] = serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "structured_output",
                "strict": true,
                "schema": schema,
            }
        });

        tracing::debug!(provider = %self.id, url = %url, "openai structured request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(provider_error(&self.id, status.as_u16(), &resp_text));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        extract_structured_content(&resp_json)
    }

    async fn stream_tokens(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_chat_body(messages, params, true);

        tracing::debug!(provider = %self.id, url = %url, "openai stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(provider_error(&self.id, status.as_u16(), &err_text));
        }

        Ok(sse_token_stream(resp, parse_openai_sse))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_structured_content_parses_json() {
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": r#"{"text":"low water","voice_profile":"calm_soothing"}"#
                }
            }]
        });
        let v = extract_structured_content(&body).unwrap();
        assert_eq!(v["text"], "low water");
    }

    #[test]
    fn extract_structured_content_rejects_prose() {
        let body = serde_json::json!({
            "choices": [{ "message": { "content": "just words, not JSON" } }]
        });
        assert!(extract_structured_content(&body).is_err());
    }

    #[test]
    fn sse_delta_yields_token() {
        let data = r#"{"choices":[{"delta":{"content":"splash"}}]}"#;
        let tokens = parse_openai_sse(data);
        assert_eq!(tokens[0].as_ref().unwrap(), "splash");
    }

    #[test]
    fn sse_done_sentinel_yields_nothing() {
        assert!(parse_openai_sse("[DONE]").is_empty());
    }

    #[test]
    fn sse_empty_delta_yields_nothing() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(parse_openai_sse(data).is_empty());
    }
}
