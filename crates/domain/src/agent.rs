//! The six agent personas and their model bindings.
//!
//! Agent ids are UI-stable: the front-end drags these names onto speaker
//! slots, so they never change. Rewiring an agent to a newer model touches
//! only [`AGENT_TABLE`].

use serde::{Deserialize, Serialize};

/// Symbolic id of one of the six installation agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Ripple,
    Current,
    Tide,
    Mist,
    Depth,
    Foam,
}

/// Which provider adapter serves an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenaiCompat,
}

/// One row of the agent lookup table.
#[derive(Debug, Clone, Copy)]
pub struct AgentSpec {
    pub id: AgentId,
    pub name: &'static str,
    pub provider: ProviderKind,
    pub model: &'static str,
    pub description: &'static str,
    pub color: &'static str,
}

/// The fixed agent → provider/model mapping.
pub const AGENT_TABLE: [AgentSpec; 6] = [
    AgentSpec {
        id: AgentId::Ripple,
        name: "Ripple",
        provider: ProviderKind::Anthropic,
        model: "claude-sonnet-4-20250514",
        description: "Quick and bright; answers in small expanding circles.",
        color: "#7fd4e8",
    },
    AgentSpec {
        id: AgentId::Current,
        name: "Current",
        provider: ProviderKind::OpenaiCompat,
        model: "gpt-4o",
        description: "Steady and directional; carries a thought downstream.",
        color: "#3a7bd5",
    },
    AgentSpec {
        id: AgentId::Tide,
        name: "Tide",
        provider: ProviderKind::Anthropic,
        model: "claude-sonnet-4-20250514",
        description: "Slow, cyclical, certain; returns to what matters.",
        color: "#1f4e79",
    },
    AgentSpec {
        id: AgentId::Mist,
        name: "Mist",
        provider: ProviderKind::OpenaiCompat,
        model: "gpt-4o-mini",
        description: "Diffuse and suggestive; never quite settles.",
        color: "#c9d6df",
    },
    AgentSpec {
        id: AgentId::Depth,
        name: "Depth",
        provider: ProviderKind::Anthropic,
        model: "claude-opus-4-20250514",
        description: "Ponderous and pressured; speaks from the basin floor.",
        color: "#10243e",
    },
    AgentSpec {
        id: AgentId::Foam,
        name: "Foam",
        provider: ProviderKind::OpenaiCompat,
        model: "gpt-4o",
        description: "Effervescent; froths at the edge of every exchange.",
        color: "#f2f7f9",
    },
];

impl AgentId {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentId::Ripple => "ripple",
            AgentId::Current => "current",
            AgentId::Tide => "tide",
            AgentId::Mist => "mist",
            AgentId::Depth => "depth",
            AgentId::Foam => "foam",
        }
    }

    /// Pure lookup into [`AGENT_TABLE`].
    pub fn spec(self) -> &'static AgentSpec {
        AGENT_TABLE
            .iter()
            .find(|s| s.id == self)
            .expect("every AgentId has a table row")
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
