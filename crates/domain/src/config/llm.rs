use serde::{Deserialize, Serialize};

use crate::agent::ProviderKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Sampling temperature for every structured call.
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    /// Per-call timeout in seconds.
    #[serde(default = "d_timeout_s")]
    pub timeout_s: u64,
    /// Bounded retry attempts for transient failures.
    #[serde(default = "d_retries")]
    pub retries: u32,
    /// The shared persona prompt seeded into every slot conversation.
    #[serde(default = "d_system_prompt")]
    pub default_system_prompt: String,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: d_temperature(),
            max_tokens: d_max_tokens(),
            timeout_s: d_timeout_s(),
            retries: d_retries(),
            default_system_prompt: d_system_prompt(),
            providers: Vec::new(),
        }
    }
}

/// One configured provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    /// Model used when an agent row does not name one.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Environment variable holding the API key.
    pub key_env: String,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_temperature() -> f32 {
    0.8
}
fn d_max_tokens() -> u32 {
    1024
}
fn d_timeout_s() -> u64 {
    60
}
fn d_retries() -> u32 {
    3
}
fn d_system_prompt() -> String {
    "You are one of six voices speaking over a basin of water. You listen, \
     then answer briefly and vividly, as yourself. Never describe the \
     installation; simply speak."
        .into()
}
