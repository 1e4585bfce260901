//! Structured-output schemas and lenient parsing of model values.
//!
//! The gateway's providers enforce the schema at the wire level; parsing
//! here still treats the values defensively because a degraded model must
//! never take a slot down when a usable utterance is present.

use serde_json::Value;

use rr_domain::error::{Error, Result};
use rr_domain::slot::SlotId;
use rr_domain::voice::VoiceProfile;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schemas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `{text, voice_profile}` — turns 1, 3, and the summary.
pub fn spoken_line_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "text": { "type": "string" },
            "voice_profile": {
                "type": "string",
                "enum": VoiceProfile::names(),
            },
        },
        "required": ["text", "voice_profile"],
        "additionalProperties": false,
    })
}

/// `{target_slot_id, comment, voice_profile}` — turn 2. The target enum is
/// narrowed to the caller's peer pool.
pub fn comment_schema(peer_slots: &[SlotId]) -> Value {
    let targets: Vec<u8> = peer_slots.iter().map(|s| s.get()).collect();
    serde_json::json!({
        "type": "object",
        "properties": {
            "target_slot_id": {
                "type": "integer",
                "enum": targets,
            },
            "comment": { "type": "string" },
            "voice_profile": {
                "type": "string",
                "enum": VoiceProfile::names(),
            },
        },
        "required": ["target_slot_id", "comment", "voice_profile"],
        "additionalProperties": false,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parsed values
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SpokenLine {
    pub text: String,
    pub voice_profile: VoiceProfile,
}

#[derive(Debug, Clone)]
pub struct CommentDraft {
    /// `None` when the model produced no usable slot number at all.
    pub target_slot_id: Option<SlotId>,
    pub comment: String,
    pub voice_profile: VoiceProfile,
}

pub fn parse_spoken_line(value: &Value) -> Result<SpokenLine> {
    let text = required_text(value, "text")?;
    Ok(SpokenLine {
        text,
        voice_profile: profile_of(value),
    })
}

pub fn parse_comment(value: &Value) -> Result<CommentDraft> {
    let comment = required_text(value, "comment")?;
    let target_slot_id = value
        .get("target_slot_id")
        .and_then(slot_number)
        .and_then(|n| SlotId::new(n).ok());
    Ok(CommentDraft {
        target_slot_id,
        comment,
        voice_profile: profile_of(value),
    })
}

fn required_text(value: &Value, field: &str) -> Result<String> {
    let text = value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if text.is_empty() {
        return Err(Error::ModelOutput(format!("missing or empty '{field}'")));
    }
    Ok(text.to_owned())
}

fn profile_of(value: &Value) -> VoiceProfile {
    value
        .get("voice_profile")
        .and_then(|v| v.as_str())
        .map(VoiceProfile::parse_or_fallback)
        .unwrap_or(VoiceProfile::FALLBACK)
}

/// Accept a slot number as an integer or a numeric string; models differ.
fn slot_number(v: &Value) -> Option<u8> {
    if let Some(n) = v.as_u64() {
        return u8::try_from(n).ok();
    }
    v.as_str().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    #[test]
    fn spoken_line_parses() {
        let v = serde_json::json!({
            "text": "  the surface remembers  ",
            "voice_profile": "warm_professional",
        });
        let line = parse_spoken_line(&v).unwrap();
        assert_eq!(line.text, "the surface remembers");
        assert_eq!(line.voice_profile, VoiceProfile::WarmProfessional);
    }

    #[test]
    fn empty_text_is_rejected() {
        let v = serde_json::json!({ "text": "   ", "voice_profile": "friendly_casual" });
        assert!(parse_spoken_line(&v).is_err());
    }

    #[test]
    fn unknown_profile_falls_back() {
        let v = serde_json::json!({ "text": "hi", "voice_profile": "gravelly_bass" });
        let line = parse_spoken_line(&v).unwrap();
        assert_eq!(line.voice_profile, VoiceProfile::FALLBACK);
    }

    #[test]
    fn comment_accepts_numeric_string_target() {
        let v = serde_json::json!({
            "target_slot_id": "4",
            "comment": "you always ripple outward",
            "voice_profile": "playful_expressive",
        });
        let draft = parse_comment(&v).unwrap();
        assert_eq!(draft.target_slot_id, Some(slot(4)));
    }

    #[test]
    fn out_of_range_target_becomes_none() {
        let v = serde_json::json!({
            "target_slot_id": 9,
            "comment": "hm",
            "voice_profile": "friendly_casual",
        });
        let draft = parse_comment(&v).unwrap();
        assert_eq!(draft.target_slot_id, None);
    }

    #[test]
    fn comment_schema_narrows_targets() {
        let schema = comment_schema(&[slot(2), slot(5)]);
        assert_eq!(
            schema["properties"]["target_slot_id"]["enum"],
            serde_json::json!([2, 5])
        );
    }
}
