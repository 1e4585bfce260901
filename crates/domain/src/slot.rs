//! Speaker-slot identifiers and per-turn records.
//!
//! Six physical speakers ring the basin; a request binds each participating
//! slot to an agent. Everything the four-turn choreography produces is
//! recorded per `(slot, turn)`.

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::{Error, ErrorClass, Result};
use crate::voice::VoiceProfile;

/// Number of physical speaker slots around the basin.
pub const SLOT_COUNT: u8 = 6;

/// One of the six speaker positions, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SlotId(u8);

impl<'de> Deserialize<'de> for SlotId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = u8::deserialize(d)?;
        SlotId::new(raw).map_err(|_| {
            serde::de::Error::custom(format!("slot id {raw} out of range 1..={SLOT_COUNT}"))
        })
    }
}

impl SlotId {
    pub fn new(raw: u8) -> Result<Self> {
        if (1..=SLOT_COUNT).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(Error::Other(format!(
                "slot id {raw} out of range 1..={SLOT_COUNT}"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The clockwise neighbour, wrapping 6 → 1.
    pub fn neighbour(self) -> SlotId {
        SlotId(self.0 % SLOT_COUNT + 1)
    }

    /// All six slots in ascending order.
    pub fn all() -> impl Iterator<Item = SlotId> {
        (1..=SLOT_COUNT).map(SlotId)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the four choreography phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TurnIndex {
    Respond,
    Comment,
    Reply,
    Summary,
}

impl TurnIndex {
    pub fn number(self) -> u8 {
        match self {
            TurnIndex::Respond => 1,
            TurnIndex::Comment => 2,
            TurnIndex::Reply => 3,
            TurnIndex::Summary => 4,
        }
    }

    pub fn kind(self) -> MessageKind {
        match self {
            TurnIndex::Respond => MessageKind::Response,
            TurnIndex::Comment => MessageKind::Comment,
            TurnIndex::Reply => MessageKind::Reply,
            TurnIndex::Summary => MessageKind::Summary,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(TurnIndex::Respond),
            2 => Some(TurnIndex::Comment),
            3 => Some(TurnIndex::Reply),
            4 => Some(TurnIndex::Summary),
            _ => None,
        }
    }
}

impl Serialize for TurnIndex {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for TurnIndex {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let n = u8::deserialize(d)?;
        TurnIndex::from_number(n)
            .ok_or_else(|| serde::de::Error::custom(format!("turn index {n} out of range 1..=4")))
    }
}

/// What a slot utters in a given turn. Paired with [`TurnIndex`] as
/// (1, response), (2, comment), (3, reply), (4, summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Response,
    Comment,
    Reply,
    Summary,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Response => "response",
            MessageKind::Comment => "comment",
            MessageKind::Reply => "reply",
            MessageKind::Summary => "summary",
        }
    }
}

/// Per-request binding of a slot to an agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAssignment {
    pub slot_id: SlotId,
    pub agent_id: AgentId,
}

/// The record of one slot's utterance in one turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub slot_id: SlotId,
    pub agent_id: AgentId,
    pub turn_index: TurnIndex,
    pub kind: MessageKind,
    pub text: String,
    pub voice_profile: VoiceProfile,
    /// Only set for `kind = comment`: the slot being addressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_slot_id: Option<SlotId>,
    /// Set when the TTS clip has been written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorClass>,
}

/// The (comments in, reply out) exchange derived for a target slot after
/// turn 3.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialogue {
    pub target_slot_id: SlotId,
    pub commenters: Vec<Commenter>,
    pub respondent: Respondent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commenter {
    pub from_slot: SlotId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Respondent {
    pub slot_id: SlotId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_id_range() {
        assert!(SlotId::new(0).is_err());
        assert!(SlotId::new(1).is_ok());
        assert!(SlotId::new(6).is_ok());
        assert!(SlotId::new(7).is_err());
    }

    #[test]
    fn neighbour_wraps_around() {
        assert_eq!(SlotId::new(1).unwrap().neighbour().get(), 2);
        assert_eq!(SlotId::new(5).unwrap().neighbour().get(), 6);
        assert_eq!(SlotId::new(6).unwrap().neighbour().get(), 1);
    }

    #[test]
    fn turn_kind_pairing() {
        assert_eq!(TurnIndex::Respond.kind(), MessageKind::Response);
        assert_eq!(TurnIndex::Comment.kind(), MessageKind::Comment);
        assert_eq!(TurnIndex::Reply.kind(), MessageKind::Reply);
        assert_eq!(TurnIndex::Summary.kind(), MessageKind::Summary);
    }

    #[test]
    fn slot_id_deserialization_validates_range() {
        let ok: SlotId = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
        assert!(serde_json::from_str::<SlotId>("0").is_err());
        assert!(serde_json::from_str::<SlotId>("7").is_err());
    }

    #[test]
    fn turn_index_serializes_as_number() {
        assert_eq!(serde_json::to_string(&TurnIndex::Reply).unwrap(), "3");
        let parsed: TurnIndex = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, TurnIndex::Comment);
        assert!(serde_json::from_str::<TurnIndex>("5").is_err());
    }
}
