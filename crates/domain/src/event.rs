//! Wire events: the per-request SSE stream consumed by the UI and the
//! process-wide push messages consumed by the visualisation renderer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::agent::AgentId;
use crate::error::ErrorClass;
use crate::slot::{Dialogue, MessageKind, SlotAssignment, SlotId, TurnIndex};
use crate::voice::VoiceProfile;
use crate::wave::WaveTrack;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE events (UI stream)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted on the `/v1/chat` SSE stream.
///
/// Within one slot and turn the order is causal (`slot.start` →
/// `slot.done` → `slot.audio`); across slots interleaving is arbitrary.
/// The stream always terminates with exactly one [`WorkflowEvent::Done`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    #[serde(rename = "session.start", rename_all = "camelCase")]
    SessionStart {
        session_id: String,
        slots: Vec<SlotAssignment>,
    },

    #[serde(rename = "turn.start", rename_all = "camelCase")]
    TurnStart { turn_index: TurnIndex },

    #[serde(rename = "slot.start", rename_all = "camelCase")]
    SlotStart {
        turn_index: TurnIndex,
        slot_id: SlotId,
        agent_id: AgentId,
        kind: MessageKind,
    },

    #[serde(rename = "slot.done", rename_all = "camelCase")]
    SlotDone {
        turn_index: TurnIndex,
        slot_id: SlotId,
        agent_id: AgentId,
        kind: MessageKind,
        text: String,
        voice_profile: VoiceProfile,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_slot_id: Option<SlotId>,
    },

    #[serde(rename = "slot.audio", rename_all = "camelCase")]
    SlotAudio {
        turn_index: TurnIndex,
        slot_id: SlotId,
        kind: MessageKind,
        audio_path: String,
    },

    #[serde(rename = "slot.error", rename_all = "camelCase")]
    SlotError {
        turn_index: TurnIndex,
        slot_id: SlotId,
        kind: MessageKind,
        error: ErrorClass,
    },

    #[serde(rename = "turn.done", rename_all = "camelCase")]
    TurnDone {
        turn_index: TurnIndex,
        slot_count: usize,
    },

    #[serde(rename = "summary.start", rename_all = "camelCase")]
    SummaryStart { slot_id: SlotId, agent_id: AgentId },

    #[serde(rename = "summary.done", rename_all = "camelCase")]
    SummaryDone {
        slot_id: SlotId,
        agent_id: AgentId,
        text: String,
        voice_profile: VoiceProfile,
    },

    #[serde(rename = "summary.audio", rename_all = "camelCase")]
    SummaryAudio { audio_path: String },

    /// Terminal sentinel; the SSE handler stops reading when it sees this.
    #[serde(rename = "done", rename_all = "camelCase")]
    Done { completed_slots: usize, turns: u8 },

    /// Request-level failure surfaced before the workflow starts
    /// (e.g. another dialogue already in progress).
    #[serde(rename = "error", rename_all = "camelCase")]
    Error { message: String },
}

impl WorkflowEvent {
    /// The SSE `event:` field name.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::SessionStart { .. } => "session.start",
            WorkflowEvent::TurnStart { .. } => "turn.start",
            WorkflowEvent::SlotStart { .. } => "slot.start",
            WorkflowEvent::SlotDone { .. } => "slot.done",
            WorkflowEvent::SlotAudio { .. } => "slot.audio",
            WorkflowEvent::SlotError { .. } => "slot.error",
            WorkflowEvent::TurnDone { .. } => "turn.done",
            WorkflowEvent::SummaryStart { .. } => "summary.start",
            WorkflowEvent::SummaryDone { .. } => "summary.done",
            WorkflowEvent::SummaryAudio { .. } => "summary.audio",
            WorkflowEvent::Done { .. } => "done",
            WorkflowEvent::Error { .. } => "error",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Renderer push messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Aggregation status of a push message. Consumers never have to infer
/// partiality; `missing` lists the slots whose waves did not arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyStatus {
    Complete,
    Partial,
}

/// The common envelope of every renderer push frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub session_id: String,
    /// Monotonic per-session sequence number, starting at 1.
    pub seq: u64,
    pub ts: chrono::DateTime<chrono::Utc>,
    pub payload: PushPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PushPayload {
    TurnWavesReady(TurnWavesReady),
    DialogueReady(DialogueReady),
    FinalSummaryReady(FinalSummaryReady),
}

pub const PUSH_TURN_WAVES_READY: &str = "turn.waves_ready";
pub const PUSH_DIALOGUE_READY: &str = "dialogue.ready";
pub const PUSH_FINAL_SUMMARY_READY: &str = "final_summary.ready";

/// One per turn 1-3: every wave track that arrived for the turn, keyed by
/// source slot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnWavesReady {
    pub turn_index: TurnIndex,
    pub status: ReadyStatus,
    pub slots: BTreeMap<SlotId, Vec<WaveTrack>>,
    pub missing: Vec<SlotId>,
}

/// Aggregate view of the whole dialogue after turn 3.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueReady {
    pub dialogues: Vec<Dialogue>,
    pub status: ReadyStatus,
    pub missing: Vec<SlotId>,
}

/// The six summary waves, keyed by target slot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSummaryReady {
    pub text: String,
    pub voice_profile: VoiceProfile,
    pub status: ReadyStatus,
    pub waves: BTreeMap<SlotId, WaveTrack>,
    pub missing: Vec<SlotId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_event_names_match_serde_tags() {
        let ev = WorkflowEvent::SlotAudio {
            turn_index: TurnIndex::Respond,
            slot_id: SlotId::new(2).unwrap(),
            kind: MessageKind::Response,
            audio_path: "tts/sessions/x/turn_1/clip.wav".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], ev.name());
        assert_eq!(json["slotId"], 2);
        assert_eq!(json["turnIndex"], 1);
    }

    #[test]
    fn done_event_shape() {
        let ev = WorkflowEvent::Done {
            completed_slots: 5,
            turns: 4,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["completedSlots"], 5);
        assert_eq!(json["turns"], 4);
    }

    #[test]
    fn push_frame_envelope() {
        let frame = PushFrame {
            kind: PUSH_TURN_WAVES_READY,
            session_id: "abc".into(),
            seq: 1,
            ts: chrono::Utc::now(),
            payload: PushPayload::TurnWavesReady(TurnWavesReady {
                turn_index: TurnIndex::Respond,
                status: ReadyStatus::Partial,
                slots: BTreeMap::new(),
                missing: vec![SlotId::new(4).unwrap()],
            }),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "turn.waves_ready");
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["seq"], 1);
        assert_eq!(json["payload"]["status"], "partial");
        assert_eq!(json["payload"]["missing"][0], 4);
    }
}
