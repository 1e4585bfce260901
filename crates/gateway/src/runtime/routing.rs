//! Inter-agent routing: peer pools, comment fan-in, dialogue derivation.
//!
//! Every tie-break in here is a deterministic function of its inputs so
//! that tests (and the installation's operators) can predict exact
//! routing for a given session.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use rr_domain::agent::AgentId;
use rr_domain::slot::{Commenter, Dialogue, Respondent, SlotId, TurnRecord};

/// One turn-1 participant as seen from another slot.
#[derive(Debug, Clone)]
pub struct Peer {
    pub slot_id: SlotId,
    pub agent_id: AgentId,
    pub text: String,
}

/// Incoming comments per target may not exceed this; surplus is dropped
/// from the routing map only (audio still renders).
pub const MAX_COMMENTERS: usize = 3;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Peer pools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build slot `s`'s peer pool: every other turn-1 success, shuffled
/// deterministically by `(session_id, s)`.
pub fn peer_pool(
    session_id: &str,
    slot: SlotId,
    turn1: &BTreeMap<SlotId, TurnRecord>,
) -> Vec<Peer> {
    let mut peers: Vec<Peer> = turn1
        .values()
        .filter(|r| r.slot_id != slot)
        .map(|r| Peer {
            slot_id: r.slot_id,
            agent_id: r.agent_id,
            text: r.text.clone(),
        })
        .collect();
    let seed = shuffle_seed(session_id, slot);
    shuffle(&mut peers, seed);
    peers
}

/// Seed derivation: the first eight bytes of `sha256(session_id ‖ slot)`.
fn shuffle_seed(session_id: &str, slot: SlotId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update([slot.get()]);
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

/// Fisher-Yates driven by a splitmix64 stream over the seed.
fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    };
    for i in (1..items.len()).rev() {
        let j = (next() % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fan-in grouping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Group turn-2 comments by their target, keeping at most
/// [`MAX_COMMENTERS`] per target — the first three by ascending source
/// slot. Dropped comments vanish from the routing map only.
pub fn group_comments(turn2: &BTreeMap<SlotId, TurnRecord>) -> BTreeMap<SlotId, Vec<(SlotId, String)>> {
    let mut grouped: BTreeMap<SlotId, Vec<(SlotId, String)>> = BTreeMap::new();
    // BTreeMap iteration is ascending by source slot, so "first three"
    // falls out of insertion order.
    for record in turn2.values() {
        let Some(target) = record.target_slot_id else {
            continue;
        };
        let incoming = grouped.entry(target).or_default();
        if incoming.len() < MAX_COMMENTERS {
            incoming.push((record.slot_id, record.text.clone()));
        } else {
            tracing::debug!(
                target = %target,
                from = %record.slot_id,
                "comment over fan-in cap, dropped from reply routing"
            );
        }
    }
    grouped
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dialogue derivation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The (comments in, reply out) triple per replied-to target, for the
/// renderer's aggregate view and the session manifest.
pub fn derive_dialogues(
    grouped: &BTreeMap<SlotId, Vec<(SlotId, String)>>,
    turn2: &BTreeMap<SlotId, TurnRecord>,
    turn3: &BTreeMap<SlotId, TurnRecord>,
) -> Vec<Dialogue> {
    grouped
        .iter()
        .filter_map(|(target, incoming)| {
            let reply = turn3.get(target)?;
            let commenters = incoming
                .iter()
                .map(|(from, _)| Commenter {
                    from_slot: *from,
                    audio_path: turn2.get(from).and_then(|r| r.audio_path.clone()),
                })
                .collect();
            Some(Dialogue {
                target_slot_id: *target,
                commenters,
                respondent: Respondent {
                    slot_id: *target,
                    audio_path: reply.audio_path.clone(),
                },
            })
        })
        .collect()
}
