//! ElevenLabs-style TTS adapter.
//!
//! Requests raw PCM from the provider and wraps it with a WAV header
//! before writing, so everything downstream (playback, wave decomposition)
//! reads plain WAV. The provider SDK surface is one HTTP POST; voice
//! shaping comes from the resolved [`VoiceProfile`] settings.

use std::path::{Path, PathBuf};

use rr_domain::config::TtsConfig;
use rr_domain::error::{Error, Result};
use rr_domain::voice::VoiceProfile;

pub struct TtsRenderer {
    base_url: String,
    api_key: Option<String>,
    output_format: String,
    sample_rate: u32,
    client: reqwest::Client,
}

impl TtsRenderer {
    pub fn from_config(cfg: &TtsConfig) -> Result<Self> {
        let api_key = match std::env::var(&cfg.key_env) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                tracing::warn!(
                    env_var = %cfg.key_env,
                    "TTS API key not set — speech rendering will fail per-clip"
                );
                None
            }
        };

        let sample_rate = parse_pcm_rate(&cfg.output_format)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_s))
            .build()
            .map_err(|e| Error::Tts(format!("building HTTP client: {e}")))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            output_format: cfg.output_format.clone(),
            sample_rate,
            client,
        })
    }

    /// Render `text` with `profile` into a WAV file at `out_path`.
    ///
    /// The file exists and is fully written when this returns `Ok`.
    pub async fn render(
        &self,
        text: &str,
        profile: VoiceProfile,
        out_path: &Path,
    ) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(Error::Tts("empty text".into()));
        }
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Tts("no API key configured".into()))?;

        let settings = profile.settings();
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, settings.voice_id, self.output_format
        );

        let mut voice_settings = serde_json::json!({
            "stability": settings.stability,
            "similarity_boost": settings.similarity_boost,
            "style": settings.style,
            "use_speaker_boost": settings.use_speaker_boost,
        });
        if let Some(speed) = settings.speed {
            voice_settings["speed"] = serde_json::json!(speed);
        }

        let body = serde_json::json!({
            "text": text,
            "model_id": settings.model_id,
            "voice_settings": voice_settings,
        });

        tracing::debug!(
            profile = %profile,
            chars = text.len(),
            path = %out_path.display(),
            "rendering speech"
        );

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::Tts(format!(
                "provider returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let pcm = resp
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("reading body: {e}")))?;
        if pcm.is_empty() {
            return Err(Error::Tts("provider returned no audio".into()));
        }

        // WAV framing is synchronous file IO; keep it off the scheduler.
        let path = out_path.to_path_buf();
        let sample_rate = self.sample_rate;
        let written = tokio::task::spawn_blocking(move || {
            write_pcm_as_wav(&path, &pcm, sample_rate).map(|_| path)
        })
        .await
        .map_err(|e| Error::Tts(format!("WAV write task failed: {e}")))??;

        Ok(written)
    }
}

/// Extract the sample rate from a `pcm_<rate>` format string.
fn parse_pcm_rate(format: &str) -> Result<u32> {
    format
        .strip_prefix("pcm_")
        .and_then(|r| r.parse().ok())
        .ok_or_else(|| Error::Config(format!("unsupported TTS output format '{format}'")))
}

/// Wrap little-endian 16-bit mono PCM with a WAV header.
fn write_pcm_as_wav(path: &Path, pcm: &[u8], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Error::Tts(format!("creating WAV writer: {e}")))?;

    for frame in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([frame[0], frame[1]]);
        writer
            .write_sample(sample)
            .map_err(|e| Error::Tts(format!("writing sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Tts(format!("finalizing WAV: {e}")))?;
    Ok(())
}
