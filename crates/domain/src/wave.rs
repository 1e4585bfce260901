//! Wave decomposition job and result types.
//!
//! A rendered TTS clip becomes N cosine-synthesised wave tracks, each
//! remapped into the frequency band of a target speaker slot. The bands
//! form a symmetric dome over the basin: high at slots 1/6, low at 3/4.

use std::path::PathBuf;

use serde::Serialize;

use crate::slot::{MessageKind, SlotId, TurnIndex};

/// Inclusive frequency band for one speaker slot, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FreqRange {
    pub low_hz: f32,
    pub high_hz: f32,
}

/// The symmetric frequency dome: slot → band.
pub fn slot_freq_target(slot: SlotId) -> FreqRange {
    let (low_hz, high_hz) = match slot.get() {
        1 | 6 => (80.0, 100.0),
        2 | 5 => (50.0, 70.0),
        _ => (20.0, 40.0),
    };
    FreqRange { low_hz, high_hz }
}

/// Target slots for the wave tracks of one source clip.
///
/// Turns 1-3: two tracks, the source slot and its clockwise neighbour.
/// The summary clip fans out to all six slots.
pub fn wave_targets(turn: TurnIndex, source_slot: SlotId) -> Vec<SlotId> {
    match turn {
        TurnIndex::Summary => SlotId::all().collect(),
        _ => vec![source_slot, source_slot.neighbour()],
    }
}

/// A decomposition job submitted to the worker pool.
#[derive(Debug, Clone)]
pub struct WaveJob {
    pub session_id: String,
    pub turn_index: TurnIndex,
    pub kind: MessageKind,
    pub source_slot_id: SlotId,
    pub source_audio_path: PathBuf,
    pub output_dir: PathBuf,
    /// `(wave number, target slot, band)` triples, one per output track.
    pub slot_freq_targets: Vec<(u8, SlotId, FreqRange)>,
}

impl WaveJob {
    /// Build a job with the standard fan-out for `(turn, source slot)`.
    pub fn new(
        session_id: String,
        turn_index: TurnIndex,
        source_slot_id: SlotId,
        source_audio_path: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        let slot_freq_targets = wave_targets(turn_index, source_slot_id)
            .into_iter()
            .enumerate()
            .map(|(i, slot)| (i as u8 + 1, slot, slot_freq_target(slot)))
            .collect();
        Self {
            session_id,
            turn_index,
            kind: turn_index.kind(),
            source_slot_id,
            source_audio_path,
            output_dir,
            slot_freq_targets,
        }
    }
}

/// One synthesised track of a completed job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveTrack {
    pub wave_num: u8,
    pub target_slot_id: SlotId,
    pub abs_path: String,
    pub rel_path: String,
    pub freq_range_hz: FreqRange,
    /// Envelope-tracking error of this track against the source, 0 = exact.
    pub rmse: f32,
}

/// Published by the pool for every finished (or failed) job.
#[derive(Debug, Clone)]
pub struct WaveJobResult {
    pub job: WaveJob,
    pub tracks: Vec<WaveTrack>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    #[test]
    fn dome_is_symmetric() {
        assert_eq!(slot_freq_target(slot(1)), slot_freq_target(slot(6)));
        assert_eq!(slot_freq_target(slot(2)), slot_freq_target(slot(5)));
        assert_eq!(slot_freq_target(slot(3)), slot_freq_target(slot(4)));
        assert_eq!(slot_freq_target(slot(1)).low_hz, 80.0);
        assert_eq!(slot_freq_target(slot(3)).high_hz, 40.0);
    }

    #[test]
    fn spoken_turns_fan_out_to_two_slots() {
        for n in 1..=6 {
            let targets = wave_targets(TurnIndex::Respond, slot(n));
            assert_eq!(targets, vec![slot(n), slot(n).neighbour()]);
        }
        // Slot 6 wraps to slot 1.
        assert_eq!(
            wave_targets(TurnIndex::Comment, slot(6)),
            vec![slot(6), slot(1)]
        );
    }

    #[test]
    fn summary_fans_out_to_all_slots() {
        let targets = wave_targets(TurnIndex::Summary, slot(2));
        assert_eq!(targets.len(), 6);
        assert_eq!(targets, SlotId::all().collect::<Vec<_>>());
    }

    #[test]
    fn job_numbering_starts_at_one() {
        let job = WaveJob::new(
            "sid".into(),
            TurnIndex::Respond,
            slot(3),
            PathBuf::from("/tmp/in.wav"),
            PathBuf::from("/tmp/out"),
        );
        assert_eq!(job.slot_freq_targets.len(), 2);
        assert_eq!(job.slot_freq_targets[0].0, 1);
        assert_eq!(job.slot_freq_targets[1].0, 2);
        assert_eq!(job.slot_freq_targets[1].1, slot(4));
        assert_eq!(job.kind, MessageKind::Response);
    }
}
