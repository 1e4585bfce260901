//! The renderer push channel: a process-wide, single-client WebSocket.
//!
//! Flow:
//! 1. The visualisation host connects to `GET /v1/events`
//! 2. The connection is installed as *the* client; a newcomer evicts the
//!    incumbent (last writer wins)
//! 3. The server pushes UTF-8 JSON text frames; the client sends nothing
//!
//! Publication never blocks the wave pool or the workflow: frames go over
//! an unbounded channel, and with no client connected they are dropped
//! silently — no buffering, no replay.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rr_domain::event::PushFrame;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Client {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

pub struct PushChannel {
    enabled: bool,
    client: Mutex<Option<Client>>,
    next_id: AtomicU64,
}

impl PushChannel {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            client: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Install a new client, returning its frame receiver and connection
    /// id. Any incumbent's sender is dropped, which ends its forward loop
    /// and closes its socket.
    pub(crate) fn install(&self) -> (u64, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self.client.lock().replace(Client { id, tx });
        if let Some(old) = previous {
            tracing::info!(
                old_client = old.id,
                new_client = id,
                "renderer client evicted by newcomer"
            );
        }
        (id, rx)
    }

    /// Remove the client slot, but only if it still belongs to `id` (a
    /// newcomer may have replaced it already).
    pub(crate) fn remove(&self, id: u64) {
        let mut slot = self.client.lock();
        if slot.as_ref().is_some_and(|c| c.id == id) {
            *slot = None;
        }
    }

    /// Serialize and push a frame to the connected client, if any.
    /// Never blocks; frames without a client are dropped.
    pub fn publish(&self, frame: &PushFrame) {
        if !self.enabled {
            return;
        }
        let text = match serde_json::to_string(frame) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "push frame serialization failed");
                return;
            }
        };

        let slot = self.client.lock();
        match slot.as_ref() {
            Some(client) => {
                if client.tx.send(text).is_err() {
                    tracing::debug!(
                        kind = frame.kind,
                        "renderer client channel closed, frame dropped"
                    );
                }
            }
            None => {
                tracing::debug!(
                    kind = frame.kind,
                    session_id = %frame.session_id,
                    "no renderer connected, frame dropped"
                );
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /v1/events — upgrade to WebSocket.
pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let channel = state.events.push.clone();
    if !channel.enabled() {
        return (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "renderer push channel is disabled",
        )
            .into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, channel))
        .into_response()
}

async fn handle_socket(socket: WebSocket, channel: Arc<PushChannel>) {
    let (id, mut frame_rx) = channel.install();
    tracing::info!(client = id, "renderer connected");

    let (mut ws_sink, mut ws_stream) = socket.split();

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    Some(text) => {
                        if ws_sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // Sender dropped: a newcomer took our slot.
                    None => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            inbound = ws_stream.next() => {
                match inbound {
                    // The renderer is push-only; drain and ignore.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    channel.remove(id);
    tracing::info!(client = id, "renderer disconnected");
}
