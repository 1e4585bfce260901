pub mod admin;
pub mod agents;
pub mod chat;
pub mod stt;

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::events::push;
use crate::state::AppState;

/// Build the full API router.
///
/// Everything is public: the gateway runs inside the installation's
/// private network and authentication is explicitly out of scope.
pub fn router(state: &AppState) -> Router<AppState> {
    // Serves TTS clips, wave tracks, and manifests read-only.
    let audio = ServeDir::new(state.artifacts.root());

    Router::new()
        .route("/v1/health", get(admin::health))
        .route("/v1/agents", get(agents::list_agents))
        .route("/v1/stt", post(stt::transcribe))
        .route("/v1/chat", post(chat::chat))
        .route("/v1/reset", post(admin::reset))
        .route("/v1/events", get(push::events_ws))
        .nest_service("/v1/audio", audio)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
