//! The four-turn workflow orchestrator.
//!
//! `INIT → T1 (respond) → T2 (comment) → T3 (reply) → T4 (summary) → DONE`.
//! Within a turn, per-slot work runs as parallel tasks; turns are
//! separated by a barrier (the supervisor awaits the whole JoinSet), which
//! is what makes `turn.done(n)` strictly precede any `slot.start` of turn
//! n+1. TTS renders are spawned as tracked side tasks: they emit
//! `slot.audio` whenever they finish (possibly after the turn barrier) and
//! hand completed clips to the wave pool. The supervisor drains them all
//! before emitting the terminal `done` sentinel.
//!
//! Failure isolation: a slot's error removes it from later steps that need
//! it and nothing else. The stream always ends with exactly one `done`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use rr_domain::chat::ChatMessage;
use rr_domain::error::ErrorClass;
use rr_domain::event::WorkflowEvent;
use rr_domain::slot::{MessageKind, SlotAssignment, SlotId, TurnIndex, TurnRecord};
use rr_domain::voice::VoiceProfile;
use rr_domain::wave::WaveJob;

use crate::events::SummaryInfo;
use crate::state::AppState;

use super::output::{self, CommentDraft};
use super::routing::{self, Peer};
use super::{
    prompts, truncate_at_sentence, MAX_COMMENT_CHARS, MAX_RESPONSE_CHARS, MAX_SUMMARY_CHARS,
};

type EventTx = mpsc::UnboundedSender<WorkflowEvent>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input / entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One accepted `/v1/chat` request.
pub struct WorkflowInput {
    pub message: String,
    pub slots: Vec<SlotAssignment>,
}

/// Start the workflow and return `(session_id, event stream)`.
///
/// The caller reads events until [`WorkflowEvent::Done`]; dropping the
/// receiver cancels in-flight LLM generations (TTS and wave work already
/// started runs to completion detached).
pub fn run_workflow(
    state: AppState,
    input: WorkflowInput,
) -> (String, mpsc::UnboundedReceiver<WorkflowEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let session_id = match state.artifacts.begin() {
        Ok(sid) => sid,
        Err(e) => {
            tracing::error!(error = %e, "failed to allocate session artifacts");
            let sid = uuid::Uuid::new_v4().to_string();
            let _ = tx.send(WorkflowEvent::Error {
                message: "artifact storage unavailable".into(),
            });
            let _ = tx.send(WorkflowEvent::Done {
                completed_slots: 0,
                turns: 0,
            });
            return (sid, rx);
        }
    };

    let sid = session_id.clone();
    let span = tracing::info_span!("workflow", session_id = %sid);
    tokio::spawn(tracing::Instrument::instrument(
        run_workflow_inner(state, input, tx, sid),
        span,
    ));

    (session_id, rx)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervisor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn run_workflow_inner(
    state: AppState,
    input: WorkflowInput,
    tx: EventTx,
    session_id: String,
) {
    tracing::info!(slots = input.slots.len(), "dialogue begins");
    state.events.begin_session(&session_id, &input.slots);
    let _ = tx.send(WorkflowEvent::SessionStart {
        session_id: session_id.clone(),
        slots: input.slots.clone(),
    });

    // TTS side tasks across all turns; drained before the `done` sentinel.
    let mut audio_tasks: Vec<JoinHandle<()>> = Vec::new();

    // ── Turn 1: respond ────────────────────────────────────────────
    let _ = tx.send(WorkflowEvent::TurnStart {
        turn_index: TurnIndex::Respond,
    });
    let mut set = JoinSet::new();
    for assignment in &input.slots {
        set.spawn(run_respond_slot(
            state.clone(),
            tx.clone(),
            session_id.clone(),
            *assignment,
            input.message.clone(),
        ));
    }
    let turn1 = collect_turn(&mut set, &mut audio_tasks).await;
    let _ = tx.send(WorkflowEvent::TurnDone {
        turn_index: TurnIndex::Respond,
        slot_count: turn1.len(),
    });
    state.events.turn_complete(
        &session_id,
        TurnIndex::Respond,
        expected_waves(&state, &turn1),
        None,
        None,
    );

    if turn1.is_empty() {
        tracing::warn!("no slot survived turn 1, skipping the rest");
        drain_audio(audio_tasks).await;
        let _ = tx.send(WorkflowEvent::Done {
            completed_slots: 0,
            turns: 1,
        });
        state.events.session_complete(&session_id);
        return;
    }

    // ── Turn 2: comment ────────────────────────────────────────────
    let _ = tx.send(WorkflowEvent::TurnStart {
        turn_index: TurnIndex::Comment,
    });
    let mut set = JoinSet::new();
    for record in turn1.values() {
        let peers = routing::peer_pool(&session_id, record.slot_id, &turn1);
        if peers.is_empty() {
            // A lone surviving voice has no one to address.
            continue;
        }
        set.spawn(run_comment_slot(
            state.clone(),
            tx.clone(),
            session_id.clone(),
            SlotAssignment {
                slot_id: record.slot_id,
                agent_id: record.agent_id,
            },
            peers,
        ));
    }
    let turn2 = collect_turn(&mut set, &mut audio_tasks).await;
    let _ = tx.send(WorkflowEvent::TurnDone {
        turn_index: TurnIndex::Comment,
        slot_count: turn2.len(),
    });
    state.events.turn_complete(
        &session_id,
        TurnIndex::Comment,
        expected_waves(&state, &turn2),
        None,
        None,
    );

    // ── Turn 3: reply ──────────────────────────────────────────────
    let _ = tx.send(WorkflowEvent::TurnStart {
        turn_index: TurnIndex::Reply,
    });
    let grouped = routing::group_comments(&turn2);
    let mut set = JoinSet::new();
    for (target, incoming) in &grouped {
        // Comment targets are validated against turn-1 successes, but a
        // fallback may have raced a failure; re-check here.
        let Some(own) = turn1.get(target) else {
            continue;
        };
        set.spawn(run_reply_slot(
            state.clone(),
            tx.clone(),
            session_id.clone(),
            SlotAssignment {
                slot_id: own.slot_id,
                agent_id: own.agent_id,
            },
            own.text.clone(),
            incoming.clone(),
        ));
    }
    let turn3 = collect_turn(&mut set, &mut audio_tasks).await;
    let _ = tx.send(WorkflowEvent::TurnDone {
        turn_index: TurnIndex::Reply,
        slot_count: turn3.len(),
    });
    let dialogues = routing::derive_dialogues(&grouped, &turn2, &turn3);
    state.events.turn_complete(
        &session_id,
        TurnIndex::Reply,
        expected_waves(&state, &turn3),
        Some(dialogues),
        None,
    );

    // ── Turn 4: summary ────────────────────────────────────────────
    let _ = tx.send(WorkflowEvent::TurnStart {
        turn_index: TurnIndex::Summary,
    });
    let summary = run_summary(
        &state,
        &tx,
        &session_id,
        &turn1,
        &turn2,
        &turn3,
        &mut audio_tasks,
    )
    .await;
    let _ = tx.send(WorkflowEvent::TurnDone {
        turn_index: TurnIndex::Summary,
        slot_count: usize::from(summary.is_some()),
    });

    // ── Finish ─────────────────────────────────────────────────────
    drain_audio(audio_tasks).await;
    let _ = tx.send(WorkflowEvent::Done {
        completed_slots: turn1.len(),
        turns: 4,
    });

    write_manifest(&state, &session_id, &input, &turn1, &turn2, &turn3, &summary);
    state.events.session_complete(&session_id);
    tracing::info!(completed_slots = turn1.len(), "dialogue complete");
}

/// Await every slot task of one turn, separating successful records from
/// spawned TTS handles.
async fn collect_turn(
    set: &mut JoinSet<SlotOutcome>,
    audio_tasks: &mut Vec<JoinHandle<()>>,
) -> BTreeMap<SlotId, TurnRecord> {
    let mut records = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => {
                if let Some(handle) = outcome.tts {
                    audio_tasks.push(handle);
                }
                if let Some(record) = outcome.record {
                    records.insert(record.slot_id, record);
                }
            }
            Err(e) => tracing::error!(error = %e, "slot task panicked"),
        }
    }
    records
}

async fn drain_audio(audio_tasks: Vec<JoinHandle<()>>) {
    for handle in audio_tasks {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "audio task panicked");
        }
    }
}

/// Slots whose waves the renderer should wait for: those with a TTS render
/// in flight — none at all when decomposition is disabled.
fn expected_waves(state: &AppState, records: &BTreeMap<SlotId, TurnRecord>) -> Vec<SlotId> {
    if state.waves.is_none() {
        return Vec::new();
    }
    records
        .values()
        .filter(|r| r.audio_path.is_some())
        .map(|r| r.slot_id)
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-slot tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SlotOutcome {
    record: Option<TurnRecord>,
    tts: Option<JoinHandle<()>>,
}

impl SlotOutcome {
    fn failed() -> Self {
        Self {
            record: None,
            tts: None,
        }
    }
}

/// LLM call that aborts when the client goes away (receiver dropped).
/// Returns `None` on cancellation.
async fn structured_with_cancel(
    state: &AppState,
    tx: &EventTx,
    agent: rr_domain::agent::AgentId,
    messages: &[ChatMessage],
    schema: &Value,
) -> Option<rr_domain::error::Result<Value>> {
    tokio::select! {
        biased;
        _ = tx.closed() => {
            tracing::debug!(agent = %agent, "client gone, abandoning generation");
            None
        }
        result = state.gateway.structured_complete(agent, messages, schema) => Some(result),
    }
}

async fn run_respond_slot(
    state: AppState,
    tx: EventTx,
    session_id: String,
    assignment: SlotAssignment,
    message: String,
) -> SlotOutcome {
    let turn = TurnIndex::Respond;
    let slot = assignment.slot_id;
    let agent = assignment.agent_id;
    let _ = tx.send(WorkflowEvent::SlotStart {
        turn_index: turn,
        slot_id: slot,
        agent_id: agent,
        kind: turn.kind(),
    });

    state.conversations.append_user(slot, &message);
    let mut messages = state.conversations.history(slot);
    messages.push(ChatMessage::user(prompts::respond_instruction()));

    let schema = output::spoken_line_schema();
    let value = match structured_with_cancel(&state, &tx, agent, &messages, &schema).await {
        None => return SlotOutcome::failed(),
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            emit_slot_error(&tx, turn, slot, e.class());
            return SlotOutcome::failed();
        }
    };

    let line = match output::parse_spoken_line(&value) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(slot = %slot, error = %e, "unusable response payload");
            emit_slot_error(&tx, turn, slot, e.class());
            return SlotOutcome::failed();
        }
    };

    let text = truncate_at_sentence(&line.text, MAX_RESPONSE_CHARS);
    state.conversations.append_assistant(slot, &text);
    let _ = tx.send(WorkflowEvent::SlotDone {
        turn_index: turn,
        slot_id: slot,
        agent_id: agent,
        kind: turn.kind(),
        text: text.clone(),
        voice_profile: line.voice_profile,
        target_slot_id: None,
    });

    finish_slot(&state, &tx, &session_id, assignment, turn, text, line.voice_profile, None)
}

async fn run_comment_slot(
    state: AppState,
    tx: EventTx,
    session_id: String,
    assignment: SlotAssignment,
    peers: Vec<Peer>,
) -> SlotOutcome {
    let turn = TurnIndex::Comment;
    let slot = assignment.slot_id;
    let agent = assignment.agent_id;
    let _ = tx.send(WorkflowEvent::SlotStart {
        turn_index: turn,
        slot_id: slot,
        agent_id: agent,
        kind: turn.kind(),
    });

    let peer_slots: Vec<SlotId> = peers.iter().map(|p| p.slot_id).collect();
    let schema = output::comment_schema(&peer_slots);
    let mut messages = state.conversations.history(slot);
    messages.push(ChatMessage::user(prompts::comment_instruction(&peers)));

    // One validation retry, then a deterministic first-peer fallback.
    let mut draft: Option<CommentDraft> = None;
    for attempt in 0..2 {
        let value = match structured_with_cancel(&state, &tx, agent, &messages, &schema).await {
            None => return SlotOutcome::failed(),
            Some(Ok(v)) => v,
            Some(Err(e)) => {
                emit_slot_error(&tx, turn, slot, e.class());
                return SlotOutcome::failed();
            }
        };
        match output::parse_comment(&value) {
            Ok(parsed) => {
                let valid_target = parsed
                    .target_slot_id
                    .is_some_and(|t| t != slot && peer_slots.contains(&t));
                if valid_target {
                    draft = Some(parsed);
                    break;
                }
                if attempt == 0 {
                    tracing::debug!(
                        slot = %slot,
                        target = ?parsed.target_slot_id,
                        "comment target outside peer pool, reprompting"
                    );
                    messages.push(ChatMessage::user(format!(
                        "That slot is not one of the voices listed. Choose one \
                         of: {}.",
                        peer_slots
                            .iter()
                            .map(|s| s.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                } else {
                    // Keep the comment text, repoint it at the first peer.
                    draft = Some(CommentDraft {
                        target_slot_id: Some(peer_slots[0]),
                        ..parsed
                    });
                }
            }
            Err(e) => {
                tracing::warn!(slot = %slot, error = %e, "unusable comment payload");
                emit_slot_error(&tx, turn, slot, e.class());
                return SlotOutcome::failed();
            }
        }
    }
    let draft = draft.expect("loop always settles a draft or returns");
    let target = draft.target_slot_id.expect("fallback guarantees a target");

    let text = truncate_at_sentence(&draft.comment, MAX_COMMENT_CHARS);
    state.conversations.append_assistant(slot, &text);
    let _ = tx.send(WorkflowEvent::SlotDone {
        turn_index: turn,
        slot_id: slot,
        agent_id: agent,
        kind: turn.kind(),
        text: text.clone(),
        voice_profile: draft.voice_profile,
        target_slot_id: Some(target),
    });

    finish_slot(
        &state,
        &tx,
        &session_id,
        assignment,
        turn,
        text,
        draft.voice_profile,
        Some(target),
    )
}

async fn run_reply_slot(
    state: AppState,
    tx: EventTx,
    session_id: String,
    assignment: SlotAssignment,
    own_response: String,
    incoming: Vec<(SlotId, String)>,
) -> SlotOutcome {
    let turn = TurnIndex::Reply;
    let slot = assignment.slot_id;
    let agent = assignment.agent_id;
    let _ = tx.send(WorkflowEvent::SlotStart {
        turn_index: turn,
        slot_id: slot,
        agent_id: agent,
        kind: turn.kind(),
    });

    let mut messages = state.conversations.history(slot);
    messages.push(ChatMessage::user(prompts::reply_instruction(
        &own_response,
        &incoming,
    )));

    let schema = output::spoken_line_schema();
    let value = match structured_with_cancel(&state, &tx, agent, &messages, &schema).await {
        None => return SlotOutcome::failed(),
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            emit_slot_error(&tx, turn, slot, e.class());
            return SlotOutcome::failed();
        }
    };
    let line = match output::parse_spoken_line(&value) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(slot = %slot, error = %e, "unusable reply payload");
            emit_slot_error(&tx, turn, slot, e.class());
            return SlotOutcome::failed();
        }
    };

    let text = truncate_at_sentence(&line.text, MAX_RESPONSE_CHARS);
    state.conversations.append_assistant(slot, &text);
    let _ = tx.send(WorkflowEvent::SlotDone {
        turn_index: turn,
        slot_id: slot,
        agent_id: agent,
        kind: turn.kind(),
        text: text.clone(),
        voice_profile: line.voice_profile,
        target_slot_id: None,
    });

    finish_slot(&state, &tx, &session_id, assignment, turn, text, line.voice_profile, None)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Summary (turn 4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn run_summary(
    state: &AppState,
    tx: &EventTx,
    session_id: &str,
    turn1: &BTreeMap<SlotId, TurnRecord>,
    turn2: &BTreeMap<SlotId, TurnRecord>,
    turn3: &BTreeMap<SlotId, TurnRecord>,
    audio_tasks: &mut Vec<JoinHandle<()>>,
) -> Option<(TurnRecord, SummaryInfo)> {
    // Selection rule: first successful turn-1 slot by ascending id.
    let speaker = turn1.values().next()?;
    let slot = speaker.slot_id;
    let agent = speaker.agent_id;

    let _ = tx.send(WorkflowEvent::SummaryStart {
        slot_id: slot,
        agent_id: agent,
    });

    let mut lines: Vec<(SlotId, String)> = Vec::new();
    for records in [turn1, turn2, turn3] {
        for record in records.values() {
            lines.push((record.slot_id, record.text.clone()));
        }
    }

    let messages = vec![
        ChatMessage::system(&state.config.llm.default_system_prompt),
        ChatMessage::user(prompts::summary_instruction(&lines)),
    ];
    let schema = output::spoken_line_schema();
    let value = match structured_with_cancel(state, tx, agent, &messages, &schema).await {
        None => return None,
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            emit_slot_error(tx, TurnIndex::Summary, slot, e.class());
            return None;
        }
    };
    let line = match output::parse_spoken_line(&value) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, "unusable summary payload");
            emit_slot_error(tx, TurnIndex::Summary, slot, e.class());
            return None;
        }
    };

    let text = truncate_at_sentence(&line.text, MAX_SUMMARY_CHARS);
    let _ = tx.send(WorkflowEvent::SummaryDone {
        slot_id: slot,
        agent_id: agent,
        text: text.clone(),
        voice_profile: line.voice_profile,
    });

    let mut record = TurnRecord {
        slot_id: slot,
        agent_id: agent,
        turn_index: TurnIndex::Summary,
        kind: MessageKind::Summary,
        text: text.clone(),
        voice_profile: line.voice_profile,
        target_slot_id: None,
        audio_path: None,
        error: None,
    };

    if let Some((rel, handle)) = spawn_clip_render(
        state,
        tx,
        session_id,
        SlotAssignment {
            slot_id: slot,
            agent_id: agent,
        },
        TurnIndex::Summary,
        text.clone(),
        line.voice_profile,
        None,
    ) {
        record.audio_path = Some(rel);
        audio_tasks.push(handle);
    }

    let summary_info = SummaryInfo {
        text,
        voice_profile: line.voice_profile,
    };
    let expected = if state.waves.is_some() && record.audio_path.is_some() {
        SlotId::all().collect()
    } else {
        Vec::new()
    };
    state.events.turn_complete(
        session_id,
        TurnIndex::Summary,
        expected,
        None,
        Some(summary_info.clone()),
    );

    Some((record, summary_info))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Speech rendering side tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the outcome for a successful generation: the record plus its TTS
/// side task, if one could be enqueued.
#[allow(clippy::too_many_arguments)]
fn finish_slot(
    state: &AppState,
    tx: &EventTx,
    session_id: &str,
    assignment: SlotAssignment,
    turn: TurnIndex,
    text: String,
    profile: VoiceProfile,
    comment_target: Option<SlotId>,
) -> SlotOutcome {
    let mut record = TurnRecord {
        slot_id: assignment.slot_id,
        agent_id: assignment.agent_id,
        turn_index: turn,
        kind: turn.kind(),
        text: text.clone(),
        voice_profile: profile,
        target_slot_id: comment_target,
        audio_path: None,
        error: None,
    };

    let tts = spawn_clip_render(
        state,
        tx,
        session_id,
        assignment,
        turn,
        text,
        profile,
        comment_target,
    )
    .map(|(rel, handle)| {
        // The path is deterministic, so it can be recorded before the
        // render lands; `slot.audio` still waits for the file.
        record.audio_path = Some(rel);
        handle
    });

    SlotOutcome {
        record: Some(record),
        tts,
    }
}

/// Spawn the render-then-decompose side task for one utterance.
///
/// Emits `slot.audio` (or `summary.audio`) only once the WAV exists on
/// disk, then hands the clip to the wave pool. Runs to completion even if
/// the client has disconnected; wave results always reach the event
/// orchestrator.
#[allow(clippy::too_many_arguments)]
fn spawn_clip_render(
    state: &AppState,
    tx: &EventTx,
    session_id: &str,
    assignment: SlotAssignment,
    turn: TurnIndex,
    text: String,
    profile: VoiceProfile,
    comment_target: Option<SlotId>,
) -> Option<(String, JoinHandle<()>)> {
    let slot = assignment.slot_id;
    let dir = match state.artifacts.tts_dir(session_id, turn) {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(slot = %slot, error = %e, "cannot create clip directory");
            emit_slot_error(tx, turn, slot, ErrorClass::TtsError);
            return None;
        }
    };
    let filename = if turn == TurnIndex::Summary {
        state.artifacts.summary_filename(assignment.agent_id, profile)
    } else {
        state
            .artifacts
            .clip_filename(slot, assignment.agent_id, profile, comment_target)
    };
    let abs: PathBuf = dir.join(filename);
    let rel = state.artifacts.rel_path(&abs);

    let state = state.clone();
    let tx = tx.clone();
    let session_id = session_id.to_owned();
    let rel_for_task = rel.clone();

    let handle = tokio::spawn(async move {
        match state.tts.render(&text, profile, &abs).await {
            Ok(clip_path) => {
                let event = if turn == TurnIndex::Summary {
                    WorkflowEvent::SummaryAudio {
                        audio_path: rel_for_task,
                    }
                } else {
                    WorkflowEvent::SlotAudio {
                        turn_index: turn,
                        slot_id: slot,
                        kind: turn.kind(),
                        audio_path: rel_for_task,
                    }
                };
                let _ = tx.send(event);

                if let Some(pool) = &state.waves {
                    match state.artifacts.wave_dir(&session_id, turn) {
                        Ok(out_dir) => {
                            let job = WaveJob::new(
                                session_id.clone(),
                                turn,
                                slot,
                                clip_path,
                                out_dir,
                            );
                            pool.submit(job);
                        }
                        Err(e) => {
                            tracing::warn!(
                                session_id = %session_id,
                                error = %e,
                                "cannot create wave output directory"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    slot = %slot,
                    turn = turn.number(),
                    error = %e,
                    "speech rendering failed"
                );
                emit_slot_error(&tx, turn, slot, ErrorClass::TtsError);
            }
        }
    });

    Some((rel, handle))
}

fn emit_slot_error(tx: &EventTx, turn: TurnIndex, slot: SlotId, class: ErrorClass) {
    let _ = tx.send(WorkflowEvent::SlotError {
        turn_index: turn,
        slot_id: slot,
        kind: turn.kind(),
        error: class,
    });
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manifest
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn write_manifest(
    state: &AppState,
    session_id: &str,
    input: &WorkflowInput,
    turn1: &BTreeMap<SlotId, TurnRecord>,
    turn2: &BTreeMap<SlotId, TurnRecord>,
    turn3: &BTreeMap<SlotId, TurnRecord>,
    summary: &Option<(TurnRecord, SummaryInfo)>,
) {
    let turns = serde_json::json!({
        "turn_1": turn1.values().collect::<Vec<_>>(),
        "turn_2": turn2.values().collect::<Vec<_>>(),
        "turn_3": turn3.values().collect::<Vec<_>>(),
    });
    let payload = serde_json::json!({
        "sessionId": session_id,
        "slots": input.slots,
        "turns": turns,
        "summary": summary.as_ref().map(|(record, _)| record),
    });
    state.artifacts.write_manifest(session_id, &payload);
}
