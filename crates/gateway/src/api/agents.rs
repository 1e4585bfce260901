//! The agent roster the UI drags onto speaker slots.

use axum::response::{IntoResponse, Json};
use serde::Serialize;

use rr_domain::agent::{AgentSpec, AGENT_TABLE};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    pub model: &'static str,
    pub description: &'static str,
    pub color: &'static str,
}

impl From<&AgentSpec> for AgentInfo {
    fn from(spec: &AgentSpec) -> Self {
        Self {
            id: spec.id.as_str(),
            name: spec.name,
            provider: match spec.provider {
                rr_domain::agent::ProviderKind::Anthropic => "anthropic",
                rr_domain::agent::ProviderKind::OpenaiCompat => "openai_compat",
            },
            model: spec.model,
            description: spec.description,
            color: spec.color,
        }
    }
}

/// GET /v1/agents — the six fixed agents, UI-stable ids.
pub async fn list_agents() -> impl IntoResponse {
    let agents: Vec<AgentInfo> = AGENT_TABLE.iter().map(AgentInfo::from).collect();
    Json(agents)
}
