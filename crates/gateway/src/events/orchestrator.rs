//! The event orchestrator: aggregates wave-job completions into semantic
//! "waves ready" push messages.
//!
//! A single consumer task owns all per-session readiness state — the
//! workflow signals it over a control channel, the wave pool over its
//! result channel, and soft-timeout timers loop back through the control
//! channel. No locks; every mutation happens on this one task.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use rr_domain::config::EventsConfig;
use rr_domain::event::{
    DialogueReady, FinalSummaryReady, PushFrame, PushPayload, ReadyStatus, TurnWavesReady,
    PUSH_DIALOGUE_READY, PUSH_FINAL_SUMMARY_READY, PUSH_TURN_WAVES_READY,
};
use rr_domain::slot::{Dialogue, SlotAssignment, SlotId, TurnIndex};
use rr_domain::voice::VoiceProfile;
use rr_domain::wave::{WaveJobResult, WaveTrack};

use super::push::PushChannel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Control protocol (workflow → orchestrator)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Summary text carried into the `final_summary.ready` payload.
#[derive(Debug, Clone)]
pub struct SummaryInfo {
    pub text: String,
    pub voice_profile: VoiceProfile,
}

#[derive(Debug)]
pub enum Control {
    BeginSession {
        session_id: String,
        slots: Vec<SlotAssignment>,
    },
    /// A turn's LLM outputs are settled; `expected` lists the slots whose
    /// waves the renderer should wait for (for the summary turn: the six
    /// target slots).
    TurnComplete {
        session_id: String,
        turn_index: TurnIndex,
        expected: Vec<SlotId>,
        dialogues: Option<Vec<Dialogue>>,
        summary: Option<SummaryInfo>,
    },
    SessionComplete {
        session_id: String,
    },
    /// Internal: a turn's soft timeout expired.
    TurnTimeout {
        session_id: String,
        turn_index: TurnIndex,
    },
    /// Internal: drop a finished session's state.
    SessionExpired {
        session_id: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handle (held in AppState)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct EventsHandle {
    pub control_tx: mpsc::UnboundedSender<Control>,
    pub push: Arc<PushChannel>,
}

impl EventsHandle {
    pub fn begin_session(&self, session_id: &str, slots: &[SlotAssignment]) {
        let _ = self.control_tx.send(Control::BeginSession {
            session_id: session_id.to_owned(),
            slots: slots.to_vec(),
        });
    }

    pub fn turn_complete(
        &self,
        session_id: &str,
        turn_index: TurnIndex,
        expected: Vec<SlotId>,
        dialogues: Option<Vec<Dialogue>>,
        summary: Option<SummaryInfo>,
    ) {
        let _ = self.control_tx.send(Control::TurnComplete {
            session_id: session_id.to_owned(),
            turn_index,
            expected,
            dialogues,
            summary,
        });
    }

    pub fn session_complete(&self, session_id: &str) {
        let _ = self.control_tx.send(Control::SessionComplete {
            session_id: session_id.to_owned(),
        });
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-session readiness state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct TurnState {
    /// Set once `turn_complete` arrives; empty before that.
    expected: Vec<SlotId>,
    announced: bool,
    /// Turns 1-3: keyed by source slot. Summary: keyed by target slot.
    received: BTreeMap<SlotId, Vec<WaveTrack>>,
    fired: bool,
    fired_complete: bool,
}

struct SessionReadiness {
    next_seq: u64,
    turns: HashMap<TurnIndex, TurnState>,
    dialogues: Option<Vec<Dialogue>>,
    summary: Option<SummaryInfo>,
    dialogue_published: bool,
}

impl SessionReadiness {
    fn new() -> Self {
        Self {
            next_seq: 1,
            turns: HashMap::new(),
            dialogues: None,
            summary: None,
            dialogue_published: false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EventOrchestrator {
    sessions: HashMap<String, SessionReadiness>,
    push: Arc<PushChannel>,
    control_tx: mpsc::UnboundedSender<Control>,
    turn_timeout: Duration,
    dialogue_timeout: Duration,
}

/// Spawn the orchestrator's consumer task and return its handle.
pub fn spawn(
    config: &EventsConfig,
    push: Arc<PushChannel>,
    mut wave_results: mpsc::UnboundedReceiver<WaveJobResult>,
) -> EventsHandle {
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let handle = EventsHandle {
        control_tx: control_tx.clone(),
        push: push.clone(),
    };

    let mut orchestrator = EventOrchestrator {
        sessions: HashMap::new(),
        push,
        control_tx,
        turn_timeout: Duration::from_secs_f64(config.turn1_timeout_s.max(0.0)),
        dialogue_timeout: Duration::from_secs_f64(config.dialogue_timeout_s.max(0.0)),
    };

    tokio::spawn(async move {
        // The wave channel closes for good when decomposition is disabled;
        // control traffic must keep flowing regardless.
        let mut waves_open = true;
        loop {
            tokio::select! {
                ctrl = control_rx.recv() => match ctrl {
                    Some(ctrl) => orchestrator.handle_control(ctrl),
                    None => break,
                },
                result = wave_results.recv(), if waves_open => match result {
                    Some(result) => orchestrator.handle_wave_result(result),
                    None => waves_open = false,
                },
            }
        }
        tracing::info!("event orchestrator stopped");
    });

    handle
}

impl EventOrchestrator {
    fn handle_control(&mut self, ctrl: Control) {
        match ctrl {
            Control::BeginSession { session_id, slots } => {
                tracing::debug!(
                    session_id = %session_id,
                    slots = slots.len(),
                    "renderer session begins"
                );
                self.sessions
                    .insert(session_id, SessionReadiness::new());
            }

            Control::TurnComplete {
                session_id,
                turn_index,
                expected,
                dialogues,
                summary,
            } => {
                let Some(session) = self.sessions.get_mut(&session_id) else {
                    return;
                };
                if let Some(d) = dialogues {
                    session.dialogues = Some(d);
                }
                if let Some(s) = summary {
                    session.summary = Some(s);
                }
                let turn = session.turns.entry(turn_index).or_default();
                turn.expected = expected;
                turn.announced = true;

                self.schedule_timeout(&session_id, turn_index);
                self.try_fire(&session_id, turn_index, false);
            }

            Control::TurnTimeout {
                session_id,
                turn_index,
            } => {
                self.try_fire(&session_id, turn_index, true);
            }

            Control::SessionComplete { session_id } => {
                // Wave jobs may still be in flight; keep readiness state
                // around long enough for the last timeout to fire, then
                // reap it.
                let grace = self.dialogue_timeout + self.turn_timeout;
                let control_tx = self.control_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let _ = control_tx.send(Control::SessionExpired { session_id });
                });
            }

            Control::SessionExpired { session_id } => {
                if self.sessions.remove(&session_id).is_some() {
                    tracing::debug!(session_id = %session_id, "renderer session state dropped");
                }
            }
        }
    }

    fn handle_wave_result(&mut self, result: WaveJobResult) {
        let session_id = result.job.session_id.clone();
        let Some(session) = self.sessions.get_mut(&session_id) else {
            tracing::debug!(session_id = %session_id, "wave result for unknown session");
            return;
        };

        if !result.success {
            // Failed jobs stay missing; the turn's soft timeout reports them.
            return;
        }

        let turn_index = result.job.turn_index;
        let turn = session.turns.entry(turn_index).or_default();
        if turn_index == TurnIndex::Summary {
            for track in result.tracks {
                turn.received
                    .entry(track.target_slot_id)
                    .or_default()
                    .push(track);
            }
        } else {
            turn.received
                .insert(result.job.source_slot_id, result.tracks);
        }

        self.try_fire(&session_id, turn_index, false);
    }

    fn schedule_timeout(&self, session_id: &str, turn_index: TurnIndex) {
        let timeout = if turn_index == TurnIndex::Summary {
            self.dialogue_timeout
        } else {
            self.turn_timeout
        };
        let control_tx = self.control_tx.clone();
        let session_id = session_id.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = control_tx.send(Control::TurnTimeout {
                session_id,
                turn_index,
            });
        });
    }

    /// Publish the turn's aggregate if it is due: either every expected
    /// slot arrived, or the soft timeout expired.
    fn try_fire(&mut self, session_id: &str, turn_index: TurnIndex, timed_out: bool) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        let Some(turn) = session.turns.get_mut(&turn_index) else {
            return;
        };
        if turn.fired || !turn.announced {
            return;
        }

        let missing: Vec<SlotId> = turn
            .expected
            .iter()
            .filter(|slot| !turn.received.contains_key(slot))
            .copied()
            .collect();

        if !missing.is_empty() && !timed_out {
            return;
        }

        turn.fired = true;
        turn.fired_complete = missing.is_empty();
        let status = if missing.is_empty() {
            ReadyStatus::Complete
        } else {
            ReadyStatus::Partial
        };

        let seq = session.next_seq;
        session.next_seq += 1;

        let frame = if turn_index == TurnIndex::Summary {
            let summary = session.summary.clone();
            let turn = session.turns.get(&turn_index).expect("just fired");
            let waves: BTreeMap<SlotId, WaveTrack> = turn
                .received
                .iter()
                .filter_map(|(slot, tracks)| tracks.first().map(|t| (*slot, t.clone())))
                .collect();
            PushFrame {
                kind: PUSH_FINAL_SUMMARY_READY,
                session_id: session_id.to_owned(),
                seq,
                ts: chrono::Utc::now(),
                payload: PushPayload::FinalSummaryReady(FinalSummaryReady {
                    text: summary.as_ref().map(|s| s.text.clone()).unwrap_or_default(),
                    voice_profile: summary
                        .as_ref()
                        .map(|s| s.voice_profile)
                        .unwrap_or(VoiceProfile::FALLBACK),
                    status,
                    waves,
                    missing,
                }),
            }
        } else {
            let turn = session.turns.get(&turn_index).expect("just fired");
            PushFrame {
                kind: PUSH_TURN_WAVES_READY,
                session_id: session_id.to_owned(),
                seq,
                ts: chrono::Utc::now(),
                payload: PushPayload::TurnWavesReady(TurnWavesReady {
                    turn_index,
                    status,
                    slots: turn.received.clone(),
                    missing,
                }),
            }
        };

        tracing::info!(
            session_id = %session_id,
            turn = turn_index.number(),
            status = ?status,
            kind = frame.kind,
            "publishing waves-ready aggregate"
        );
        self.push.publish(&frame);

        self.try_publish_dialogue(session_id);
    }

    /// After the turn-3 aggregate, once turns 1-3 have all fired, publish
    /// the whole-dialogue view.
    fn try_publish_dialogue(&mut self, session_id: &str) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        if session.dialogue_published {
            return;
        }

        let spoken_turns = [TurnIndex::Respond, TurnIndex::Comment, TurnIndex::Reply];
        let all_fired = spoken_turns
            .iter()
            .all(|t| session.turns.get(t).is_some_and(|s| s.fired));
        if !all_fired {
            return;
        }

        let all_complete = spoken_turns
            .iter()
            .all(|t| session.turns.get(t).is_some_and(|s| s.fired_complete));
        let mut missing: Vec<SlotId> = spoken_turns
            .iter()
            .filter_map(|t| session.turns.get(t))
            .flat_map(|s| {
                s.expected
                    .iter()
                    .filter(|slot| !s.received.contains_key(slot))
                    .copied()
            })
            .collect();
        missing.sort();
        missing.dedup();

        session.dialogue_published = true;
        let seq = session.next_seq;
        session.next_seq += 1;

        let frame = PushFrame {
            kind: PUSH_DIALOGUE_READY,
            session_id: session_id.to_owned(),
            seq,
            ts: chrono::Utc::now(),
            payload: PushPayload::DialogueReady(DialogueReady {
                dialogues: session.dialogues.clone().unwrap_or_default(),
                status: if all_complete {
                    ReadyStatus::Complete
                } else {
                    ReadyStatus::Partial
                },
                missing,
            }),
        };
        self.push.publish(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_domain::slot::MessageKind;
    use rr_domain::wave::{FreqRange, WaveJob};
    use std::path::PathBuf;

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    fn orchestrator(push: Arc<PushChannel>) -> EventOrchestrator {
        let (control_tx, _control_rx) = mpsc::unbounded_channel();
        EventOrchestrator {
            sessions: HashMap::new(),
            push,
            control_tx,
            turn_timeout: Duration::from_secs(15),
            dialogue_timeout: Duration::from_secs(30),
        }
    }

    fn wave_result(session_id: &str, turn: TurnIndex, source: SlotId) -> WaveJobResult {
        let job = WaveJob::new(
            session_id.into(),
            turn,
            source,
            PathBuf::from("/tmp/in.wav"),
            PathBuf::from("/tmp/out"),
        );
        let tracks = job
            .slot_freq_targets
            .iter()
            .map(|(num, target, band)| WaveTrack {
                wave_num: *num,
                target_slot_id: *target,
                abs_path: format!("/tmp/out/w{num}.wav"),
                rel_path: format!("out/w{num}.wav"),
                freq_range_hz: *band,
                rmse: 0.01,
            })
            .collect();
        WaveJobResult {
            job,
            tracks,
            success: true,
            error: None,
            duration_ms: 5,
        }
    }

    fn begin(orch: &mut EventOrchestrator, sid: &str) {
        orch.handle_control(Control::BeginSession {
            session_id: sid.into(),
            slots: Vec::new(),
        });
    }

    fn complete_turn(
        orch: &mut EventOrchestrator,
        sid: &str,
        turn: TurnIndex,
        expected: Vec<SlotId>,
    ) {
        orch.handle_control(Control::TurnComplete {
            session_id: sid.into(),
            turn_index: turn,
            expected,
            dialogues: None,
            summary: None,
        });
    }

    async fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn turn_fires_complete_when_all_waves_arrive() {
        let push = Arc::new(PushChannel::new(true));
        let (_id, mut rx) = push.install();
        let mut orch = orchestrator(push);

        begin(&mut orch, "s1");
        complete_turn(&mut orch, "s1", TurnIndex::Respond, vec![slot(1), slot(2)]);

        orch.handle_wave_result(wave_result("s1", TurnIndex::Respond, slot(1)));
        orch.handle_wave_result(wave_result("s1", TurnIndex::Respond, slot(2)));

        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["type"], "turn.waves_ready");
        assert_eq!(frame["seq"], 1);
        assert_eq!(frame["payload"]["status"], "complete");
        assert_eq!(frame["payload"]["turnIndex"], 1);
        assert!(frame["payload"]["missing"].as_array().unwrap().is_empty());
        assert_eq!(frame["payload"]["slots"]["1"].as_array().unwrap().len(), 2);
    }

    fn push_install(push: &PushChannel) -> (u64, mpsc::UnboundedReceiver<String>) {
        push.install()
    }

    #[tokio::test]
    async fn timeout_fires_partial_with_missing_slots() {
        let push = Arc::new(PushChannel::new(true));
        let (_id, mut rx) = push_install(&push);
        let mut orch = orchestrator(push);

        begin(&mut orch, "s1");
        complete_turn(&mut orch, "s1", TurnIndex::Respond, vec![slot(1), slot(3)]);
        orch.handle_wave_result(wave_result("s1", TurnIndex::Respond, slot(1)));

        // Not fired yet: slot 3 is outstanding.
        assert!(rx.try_recv().is_err());

        orch.handle_control(Control::TurnTimeout {
            session_id: "s1".into(),
            turn_index: TurnIndex::Respond,
        });

        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["payload"]["status"], "partial");
        assert_eq!(frame["payload"]["missing"], serde_json::json!([3]));
    }

    #[tokio::test]
    async fn late_waves_after_firing_are_ignored() {
        let push = Arc::new(PushChannel::new(true));
        let (_id, mut rx) = push_install(&push);
        let mut orch = orchestrator(push);

        begin(&mut orch, "s1");
        complete_turn(&mut orch, "s1", TurnIndex::Respond, vec![slot(1)]);
        orch.handle_control(Control::TurnTimeout {
            session_id: "s1".into(),
            turn_index: TurnIndex::Respond,
        });
        let _ = next_frame(&mut rx).await;

        // The wave arrives after the aggregate went out: no second frame.
        orch.handle_wave_result(wave_result("s1", TurnIndex::Respond, slot(1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn seq_is_monotonic_within_a_session() {
        let push = Arc::new(PushChannel::new(true));
        let (_id, mut rx) = push_install(&push);
        let mut orch = orchestrator(push);

        begin(&mut orch, "s1");
        for (turn, slots) in [
            (TurnIndex::Respond, vec![slot(1)]),
            (TurnIndex::Comment, vec![slot(1)]),
            (TurnIndex::Reply, Vec::new()),
        ] {
            complete_turn(&mut orch, "s1", turn, slots.clone());
            for s in slots {
                orch.handle_wave_result(wave_result("s1", turn, s));
            }
        }

        // turn 1, turn 2, turn 3 (empty → fires complete), dialogue.
        let mut seqs = Vec::new();
        for _ in 0..4 {
            let frame = next_frame(&mut rx).await;
            seqs.push(frame["seq"].as_u64().unwrap());
        }
        assert_eq!(seqs, vec![1, 2, 3, 4]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dialogue_ready_follows_the_three_spoken_turns() {
        let push = Arc::new(PushChannel::new(true));
        let (_id, mut rx) = push_install(&push);
        let mut orch = orchestrator(push);

        begin(&mut orch, "s1");
        orch.handle_control(Control::TurnComplete {
            session_id: "s1".into(),
            turn_index: TurnIndex::Reply,
            expected: vec![slot(2)],
            dialogues: Some(vec![Dialogue {
                target_slot_id: slot(2),
                commenters: Vec::new(),
                respondent: rr_domain::slot::Respondent {
                    slot_id: slot(2),
                    audio_path: None,
                },
            }]),
            summary: None,
        });
        orch.handle_wave_result(wave_result("s1", TurnIndex::Reply, slot(2)));
        let reply_frame = next_frame(&mut rx).await;
        assert_eq!(reply_frame["payload"]["turnIndex"], 3);
        // Turns 1 and 2 have not fired: no dialogue yet.
        assert!(rx.try_recv().is_err());

        complete_turn(&mut orch, "s1", TurnIndex::Respond, vec![slot(1)]);
        orch.handle_wave_result(wave_result("s1", TurnIndex::Respond, slot(1)));
        let _turn1 = next_frame(&mut rx).await;

        complete_turn(&mut orch, "s1", TurnIndex::Comment, Vec::new());
        let _turn2 = next_frame(&mut rx).await;

        let dialogue = next_frame(&mut rx).await;
        assert_eq!(dialogue["type"], "dialogue.ready");
        assert_eq!(dialogue["payload"]["status"], "complete");
        assert_eq!(
            dialogue["payload"]["dialogues"][0]["targetSlotId"],
            2
        );
    }

    #[tokio::test]
    async fn summary_turn_publishes_final_summary_ready() {
        let push = Arc::new(PushChannel::new(true));
        let (_id, mut rx) = push_install(&push);
        let mut orch = orchestrator(push);

        begin(&mut orch, "s1");
        orch.handle_control(Control::TurnComplete {
            session_id: "s1".into(),
            turn_index: TurnIndex::Summary,
            expected: SlotId::all().collect(),
            dialogues: None,
            summary: Some(SummaryInfo {
                text: "the basin settles".into(),
                voice_profile: VoiceProfile::CalmSoothing,
            }),
        });
        orch.handle_wave_result(wave_result("s1", TurnIndex::Summary, slot(1)));

        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["type"], "final_summary.ready");
        assert_eq!(frame["payload"]["status"], "complete");
        assert_eq!(frame["payload"]["text"], "the basin settles");
        assert_eq!(frame["payload"]["voiceProfile"], "calm_soothing");
        assert_eq!(
            frame["payload"]["waves"].as_object().unwrap().len(),
            6
        );
    }

    #[tokio::test]
    async fn failed_results_stay_missing() {
        let push = Arc::new(PushChannel::new(true));
        let (_id, mut rx) = push_install(&push);
        let mut orch = orchestrator(push);

        begin(&mut orch, "s1");
        complete_turn(&mut orch, "s1", TurnIndex::Respond, vec![slot(5)]);

        let mut failed = wave_result("s1", TurnIndex::Respond, slot(5));
        failed.success = false;
        failed.tracks.clear();
        failed.error = Some("wave_timeout after stft".into());
        orch.handle_wave_result(failed);

        assert!(rx.try_recv().is_err());
        orch.handle_control(Control::TurnTimeout {
            session_id: "s1".into(),
            turn_index: TurnIndex::Respond,
        });
        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["payload"]["status"], "partial");
        assert_eq!(frame["payload"]["missing"], serde_json::json!([5]));
    }

    #[test]
    fn unknown_session_results_are_ignored() {
        let push = Arc::new(PushChannel::new(true));
        let mut orch = orchestrator(push);
        // No session begun; must not panic.
        orch.handle_wave_result(wave_result("ghost", TurnIndex::Respond, slot(1)));
    }

    #[test]
    fn fan_out_shapes_match_turn_kind() {
        // Guard: the helper builds the shapes the orchestrator relies on.
        let r = wave_result("s", TurnIndex::Respond, slot(6));
        assert_eq!(r.tracks.len(), 2);
        assert_eq!(r.job.kind, MessageKind::Response);
        assert_eq!(r.tracks[1].target_slot_id, slot(1));
        assert_eq!(
            r.tracks[0].freq_range_hz,
            FreqRange {
                low_hz: 80.0,
                high_hz: 100.0
            }
        );

        let s = wave_result("s", TurnIndex::Summary, slot(1));
        assert_eq!(s.tracks.len(), 6);
    }
}
