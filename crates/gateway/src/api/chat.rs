//! The chat endpoint — one visitor utterance in, an ordered SSE stream of
//! the four-turn choreography out.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::Stream;
use serde::Deserialize;

use rr_domain::event::WorkflowEvent;
use rr_domain::slot::{SlotAssignment, SlotId};

use crate::runtime::{run_workflow, WorkflowInput};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The visitor's transcript.
    pub message: String,
    /// Slot → agent bindings for this request.
    pub slots: Vec<SlotAssignment>,
}

fn validate(body: &ChatRequest) -> Result<(), String> {
    if body.message.trim().is_empty() {
        return Err("message must not be empty".into());
    }
    if body.slots.is_empty() {
        return Err("at least one slot assignment is required".into());
    }
    let mut seen: Vec<SlotId> = Vec::new();
    for assignment in &body.slots {
        if seen.contains(&assignment.slot_id) {
            return Err(format!("slot {} assigned twice", assignment.slot_id));
        }
        seen.push(assignment.slot_id);
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    if let Err(reason) = validate(&body) {
        return error_stream(reason).into_response();
    }

    // One dialogue at a time: all six conversations are shared state.
    let permit = match state.workflow_permit.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            return error_stream(
                "a dialogue is already in progress — one utterance at a time".into(),
            )
            .into_response();
        }
    };

    let input = WorkflowInput {
        message: body.message,
        slots: body.slots,
    };
    let (session_id, rx) = run_workflow(state, input);
    tracing::info!(session_id = %session_id, "chat stream opened");

    Sse::new(event_stream(rx, permit))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Yield events in arrival order until the `done` sentinel.
///
/// Termination is sentinel-driven on purpose: detached TTS tasks may still
/// hold senders when the workflow is finished, so channel exhaustion would
/// keep the stream open past its end.
fn event_stream(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<WorkflowEvent>,
    _permit: tokio::sync::OwnedSemaphorePermit,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let is_done = matches!(event, WorkflowEvent::Done { .. });
            yield Ok(sse_event(&event));
            if is_done {
                break;
            }
        }
        // _permit drops here, releasing the workflow slot.
    }
}

fn sse_event(event: &WorkflowEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.name()).data(data)
}

/// A request-level failure rendered as a one-event SSE stream so the UI
/// client code has a single protocol to handle.
fn error_stream(message: String) -> impl IntoResponse {
    let stream = futures_util::stream::once(async move {
        Ok::<_, std::convert::Infallible>(sse_event(&WorkflowEvent::Error { message }))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_domain::agent::AgentId;

    fn assignment(n: u8, agent: AgentId) -> SlotAssignment {
        SlotAssignment {
            slot_id: SlotId::new(n).unwrap(),
            agent_id: agent,
        }
    }

    #[test]
    fn request_deserializes_camel_case() {
        let json = r#"{
            "message": "Hello water",
            "slots": [
                { "slotId": 1, "agentId": "ripple" },
                { "slotId": 2, "agentId": "depth" }
            ]
        }"#;
        let body: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(body.slots.len(), 2);
        assert_eq!(body.slots[1].agent_id, AgentId::Depth);
        assert!(validate(&body).is_ok());
    }

    #[test]
    fn empty_message_is_rejected() {
        let body = ChatRequest {
            message: "  ".into(),
            slots: vec![assignment(1, AgentId::Ripple)],
        };
        assert!(validate(&body).is_err());
    }

    #[test]
    fn duplicate_slots_are_rejected() {
        let body = ChatRequest {
            message: "hi".into(),
            slots: vec![
                assignment(3, AgentId::Ripple),
                assignment(3, AgentId::Foam),
            ],
        };
        let err = validate(&body).unwrap_err();
        assert!(err.contains("slot 3"));
    }

    #[test]
    fn out_of_range_slot_fails_deserialization() {
        let json = r#"{ "message": "x", "slots": [{ "slotId": 7, "agentId": "mist" }] }"#;
        assert!(serde_json::from_str::<ChatRequest>(json).is_err());
    }
}
