use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event orchestrator / renderer push channel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// When false, `/v1/events` rejects connections and publishes nothing.
    #[serde(default = "d_true")]
    pub ws_enabled: bool,
    /// Soft timeout before a partial `turn.waves_ready` fires (turns 1-3).
    #[serde(default = "d_turn1_timeout_s")]
    pub turn1_timeout_s: f64,
    /// Soft timeout for the final summary waves and the dialogue aggregate.
    #[serde(default = "d_dialogue_timeout_s")]
    pub dialogue_timeout_s: f64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            ws_enabled: true,
            turn1_timeout_s: d_turn1_timeout_s(),
            dialogue_timeout_s: d_dialogue_timeout_s(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_turn1_timeout_s() -> f64 {
    15.0
}
fn d_dialogue_timeout_s() -> f64 {
    30.0
}
