use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TTS renderer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "d_tts_base_url")]
    pub base_url: String,
    /// Environment variable holding the TTS API key.
    #[serde(default = "d_tts_key_env")]
    pub key_env: String,
    /// Raw PCM format requested from the provider.
    #[serde(default = "d_tts_output_format")]
    pub output_format: String,
    #[serde(default = "d_tts_timeout_s")]
    pub timeout_s: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: d_tts_base_url(),
            key_env: d_tts_key_env(),
            output_format: d_tts_output_format(),
            timeout_s: d_tts_timeout_s(),
        }
    }
}

fn d_tts_base_url() -> String {
    "https://api.elevenlabs.io".into()
}
fn d_tts_key_env() -> String {
    "ELEVENLABS_API_KEY".into()
}
fn d_tts_output_format() -> String {
    "pcm_22050".into()
}
fn d_tts_timeout_s() -> u64 {
    60
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// STT ingest
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "d_stt_base_url")]
    pub base_url: String,
    /// Environment variable holding the STT API key.
    #[serde(default = "d_stt_key_env")]
    pub key_env: String,
    #[serde(default = "d_stt_model")]
    pub model: String,
    /// Uploads above this size are rejected with 413.
    #[serde(default = "d_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Clips below this size are rejected with 422 (too short to carry
    /// speech).
    #[serde(default = "d_min_clip_bytes")]
    pub min_clip_bytes: usize,
    #[serde(default = "d_stt_timeout_s")]
    pub timeout_s: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: d_stt_base_url(),
            key_env: d_stt_key_env(),
            model: d_stt_model(),
            max_upload_bytes: d_max_upload_bytes(),
            min_clip_bytes: d_min_clip_bytes(),
            timeout_s: d_stt_timeout_s(),
        }
    }
}

fn d_stt_base_url() -> String {
    "https://api.openai.com".into()
}
fn d_stt_key_env() -> String {
    "STT_API_KEY".into()
}
fn d_stt_model() -> String {
    "whisper-1".into()
}
fn d_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}
fn d_min_clip_bytes() -> usize {
    2_048
}
fn d_stt_timeout_s() -> u64 {
    60
}
