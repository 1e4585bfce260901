//! Voice profiles — named bundles of provider voice id and shaping
//! parameters.
//!
//! The model picks a profile name per utterance; an unknown name falls back
//! to [`VoiceProfile::FriendlyCasual`] with a warning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceProfile {
    FriendlyCasual,
    WarmProfessional,
    EnergeticUpbeat,
    CalmSoothing,
    ConfidentCharming,
    PlayfulExpressive,
}

/// Provider-side voice settings for one profile.
#[derive(Debug, Clone, Copy)]
pub struct VoiceSettings {
    pub voice_id: &'static str,
    pub model_id: &'static str,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: Option<f32>,
}

const PROFILE_TABLE: [(VoiceProfile, VoiceSettings); 6] = [
    (
        VoiceProfile::FriendlyCasual,
        VoiceSettings {
            voice_id: "EXAVITQu4vr4xnSDxMaL",
            model_id: "eleven_multilingual_v2",
            stability: 0.45,
            similarity_boost: 0.75,
            style: 0.30,
            use_speaker_boost: true,
            speed: None,
        },
    ),
    (
        VoiceProfile::WarmProfessional,
        VoiceSettings {
            voice_id: "21m00Tcm4TlvDq8ikWAM",
            model_id: "eleven_multilingual_v2",
            stability: 0.65,
            similarity_boost: 0.80,
            style: 0.15,
            use_speaker_boost: true,
            speed: None,
        },
    ),
    (
        VoiceProfile::EnergeticUpbeat,
        VoiceSettings {
            voice_id: "pNInz6obpgDQGcFmaJgB",
            model_id: "eleven_multilingual_v2",
            stability: 0.30,
            similarity_boost: 0.70,
            style: 0.60,
            use_speaker_boost: true,
            speed: Some(1.08),
        },
    ),
    (
        VoiceProfile::CalmSoothing,
        VoiceSettings {
            voice_id: "ThT5KcBeYPX3keUQqHPh",
            model_id: "eleven_multilingual_v2",
            stability: 0.80,
            similarity_boost: 0.85,
            style: 0.05,
            use_speaker_boost: false,
            speed: Some(0.92),
        },
    ),
    (
        VoiceProfile::ConfidentCharming,
        VoiceSettings {
            voice_id: "onwK4e9ZLuTAKqWW03F9",
            model_id: "eleven_multilingual_v2",
            stability: 0.55,
            similarity_boost: 0.78,
            style: 0.40,
            use_speaker_boost: true,
            speed: None,
        },
    ),
    (
        VoiceProfile::PlayfulExpressive,
        VoiceSettings {
            voice_id: "XB0fDUnXU5powFXDhCwa",
            model_id: "eleven_multilingual_v2",
            stability: 0.25,
            similarity_boost: 0.70,
            style: 0.70,
            use_speaker_boost: true,
            speed: Some(1.05),
        },
    ),
];

impl VoiceProfile {
    pub const FALLBACK: VoiceProfile = VoiceProfile::FriendlyCasual;

    pub fn as_str(self) -> &'static str {
        match self {
            VoiceProfile::FriendlyCasual => "friendly_casual",
            VoiceProfile::WarmProfessional => "warm_professional",
            VoiceProfile::EnergeticUpbeat => "energetic_upbeat",
            VoiceProfile::CalmSoothing => "calm_soothing",
            VoiceProfile::ConfidentCharming => "confident_charming",
            VoiceProfile::PlayfulExpressive => "playful_expressive",
        }
    }

    /// Parse a profile name; unknown names yield the fallback with a
    /// warning so a misbehaving model never breaks rendering.
    pub fn parse_or_fallback(name: &str) -> VoiceProfile {
        match Self::parse(name) {
            Some(p) => p,
            None => {
                tracing::warn!(profile = %name, "unknown voice profile, using fallback");
                Self::FALLBACK
            }
        }
    }

    pub fn parse(name: &str) -> Option<VoiceProfile> {
        PROFILE_TABLE
            .iter()
            .find(|(p, _)| p.as_str() == name)
            .map(|(p, _)| *p)
    }

    pub fn settings(self) -> &'static VoiceSettings {
        &PROFILE_TABLE
            .iter()
            .find(|(p, _)| *p == self)
            .expect("every profile has a table row")
            .1
    }

    /// All profile names, for embedding into structured-output schemas.
    pub fn names() -> Vec<&'static str> {
        PROFILE_TABLE.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl std::fmt::Display for VoiceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_profiles() {
        assert_eq!(
            VoiceProfile::parse("calm_soothing"),
            Some(VoiceProfile::CalmSoothing)
        );
        assert_eq!(VoiceProfile::parse("robotic_monotone"), None);
    }

    #[test]
    fn unknown_profile_falls_back() {
        assert_eq!(
            VoiceProfile::parse_or_fallback("not_a_profile"),
            VoiceProfile::FriendlyCasual
        );
    }

    #[test]
    fn every_profile_has_settings() {
        for name in VoiceProfile::names() {
            let p = VoiceProfile::parse(name).unwrap();
            let s = p.settings();
            assert!(!s.voice_id.is_empty());
            assert!((0.0..=1.0).contains(&s.stability));
            assert!((0.0..=1.0).contains(&s.style));
        }
    }

    #[test]
    fn wire_format_is_snake_case() {
        let json = serde_json::to_string(&VoiceProfile::WarmProfessional).unwrap();
        assert_eq!(json, r#""warm_professional""#);
    }
}
