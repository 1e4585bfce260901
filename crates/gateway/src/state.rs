use std::sync::Arc;

use tokio::sync::Semaphore;

use rr_domain::config::Config;
use rr_providers::Gateway;
use rr_sessions::{ConversationStore, SessionStore};
use rr_tts::TtsRenderer;
use rr_waves::WavePool;

use crate::events::EventsHandle;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, the LLM gateway, the TTS renderer
/// - **Stores** — per-slot conversations, artifact/session layout
/// - **Pipelines** — the wave worker pool, the event orchestrator handle
/// - **Concurrency** — the single workflow permit
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub gateway: Arc<Gateway>,
    pub tts: Arc<TtsRenderer>,

    // ── Stores ────────────────────────────────────────────────────────
    pub conversations: Arc<ConversationStore>,
    pub artifacts: Arc<SessionStore>,

    // ── Pipelines ─────────────────────────────────────────────────────
    /// `None` when wave decomposition is disabled by config.
    pub waves: Option<Arc<WavePool>>,
    pub events: EventsHandle,

    // ── Concurrency ───────────────────────────────────────────────────
    /// One basin, one microphone: a second `/v1/chat` while a dialogue is
    /// in flight is refused rather than interleaved over the same
    /// conversations.
    pub workflow_permit: Arc<Semaphore>,
}
