//! Health probe and the conversation reset endpoint.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// GET /v1/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /v1/reset — clear every slot conversation.
///
/// Returns the list of slot ids that held history.
pub async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.conversations.reset_all();
    tracing::info!(cleared = cleared.len(), "conversations reset via API");
    Json(cleared)
}
