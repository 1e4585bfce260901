//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API. Structured completion is done by
//! forcing a single tool whose `input_schema` is the caller's schema and
//! reading back the `tool_use` input; Anthropic guarantees the input
//! validates against the schema, so no reprompting is needed here.

use crate::sse::sse_token_stream;
use crate::traits::{GenerationParams, LlmProvider};
use crate::util::{from_reqwest, provider_error, resolve_api_key};
use rr_domain::chat::{ChatMessage, Role};
use rr_domain::config::ProviderConfig;
use rr_domain::error::{Error, Result};
use rr_domain::stream::BoxStream;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Name of the forced tool used to obtain schema-constrained output.
const OUTPUT_TOOL: &str = "emit_structured";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AnthropicProvider {
    /// Create a new provider from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.key_env)?;
        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "claude-sonnet-4-20250514".into());

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
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> Value {
        let model = params
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        // System messages go in a separate top-level `system` field.
        let mut system_parts: Vec<&str> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.content,
                })),
                Role::Assistant => api_messages.push(serde_json::json!({
                    "role": "assistant",
                    "content": msg.content,
                })),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "stream": stream,
            "max_tokens": params.max_tokens.unwrap_or(1024),
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if let Some(temp) = params.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pull the forced tool's input object out of a Messages API response.
fn extract_tool_input(body: &Value) -> Result<Value> {
    let blocks = body
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::ModelOutput("response has no content array".into()))?;

    for block in blocks {
        let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
        if block_type == "tool_use"
            && block.get("name").and_then(|v| v.as_str()) == Some(OUTPUT_TOOL)
        {
            return block
                .get("input")
                .cloned()
                .ok_or_else(|| Error::ModelOutput("tool_use block has no input".into()));
        }
    }

    Err(Error::ModelOutput(
        "model did not invoke the structured output tool".into(),
    ))
}

/// Parse a single Anthropic SSE data payload into text tokens.
fn parse_anthropic_sse(data: &str) -> Vec<Result<String>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    match v.get("type").and_then(|v| v.as_str()).unwrap_or("") {
        "content_block_delta" => {
            let text = v
                .get("delta")
                .filter(|d| d.get("type").and_then(|t| t.as_str()) == Some("text_delta"))
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str());
            match text {
                Some(t) if !t.is_empty() => vec![Ok(t.to_string())],
                _ => Vec::new(),
            }
        }
        "error" => {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            vec![Err(Error::Other(msg.to_string()))]
        }
        // ping, message_start/stop, content_block_start/stop -- ignore.
        _ => Vec::new(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn structured_complete(
        &self,
        messages: &[ChatMessage],
        schema: &Value,
        params: &GenerationParams,
    ) -> Result<Value> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut body = self.build_messages_body(messages, params, false);
        body["tools"] = serde_json::json!([{
            "name": OUTPUT_TOOL,
            "description": "Emit the response in the required structure.",
            "input_schema": schema,
        }]);
        body["tool_choice"] = serde_json::json!({ "type": "tool", "name": OUTPUT_TOOL });

        tracing::debug!(provider = %self.id, url = %url, "anthropic structured request");

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
        extract_tool_input(&resp_json)
    }

    async fn stream_tokens(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(messages, params, true);

        tracing::debug!(provider = %self.id, url = %url, "anthropic stream request");

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

        Ok(sse_token_stream(resp, parse_anthropic_sse))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tool_input_happy_path() {
        let body = serde_json::json!({
            "content": [
                { "type": "text", "text": "thinking…" },
                {
                    "type": "tool_use",
                    "name": OUTPUT_TOOL,
                    "input": { "text": "hello", "voice_profile": "calm_soothing" }
                }
            ]
        });
        let input = extract_tool_input(&body).unwrap();
        assert_eq!(input["text"], "hello");
    }

    #[test]
    fn extract_tool_input_missing_tool() {
        let body = serde_json::json!({
            "content": [{ "type": "text", "text": "no tool here" }]
        });
        assert!(extract_tool_input(&body).is_err());
    }

    #[test]
    fn sse_text_delta_yields_token() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"drip"}}"#;
        let tokens = parse_anthropic_sse(data);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].as_ref().unwrap(), "drip");
    }

    #[test]
    fn sse_ping_yields_nothing() {
        assert!(parse_anthropic_sse(r#"{"type":"ping"}"#).is_empty());
        assert!(parse_anthropic_sse(r#"{"type":"message_stop"}"#).is_empty());
    }

    #[test]
    fn sse_error_surfaces() {
        let data = r#"{"type":"error","error":{"message":"overloaded"}}"#;
        let tokens = parse_anthropic_sse(data);
        assert!(tokens[0].is_err());
    }
}
