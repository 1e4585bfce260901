//! Speech-to-text ingest: accept a recorded clip, persist it, forward it
//! to the opaque STT provider, and hand back the transcript.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::state::AppState;

/// Containers the push-to-talk recorder may upload.
const ACCEPTED_EXTENSIONS: [&str; 6] = ["wav", "webm", "ogg", "mp3", "m4a", "flac"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SttResponse {
    pub stt_session_id: String,
    pub transcript: String,
    pub audio_path: String,
    pub transcript_path: String,
    pub duration_ms: u64,
    pub mime_type: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// POST /v1/stt (multipart, field `file`).
///
/// - 413 when the clip exceeds the configured upload cap
/// - 415 for containers the recorder should never produce
/// - 422 for clips too short to carry speech
/// - 502 when the upstream STT provider fails
pub async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    // ── Pull the clip out of the form ──────────────────────────────
    let mut clip: Option<(String, String, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("input").to_owned();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        match field.bytes().await {
            Ok(bytes) => {
                clip = Some((filename, mime_type, bytes.to_vec()));
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed reading multipart clip");
                return error_response(StatusCode::BAD_REQUEST, "unreadable upload");
            }
        }
    }
    let Some((filename, mime_type, bytes)) = clip else {
        return error_response(StatusCode::BAD_REQUEST, "missing 'file' field");
    };

    // ── Caps ───────────────────────────────────────────────────────
    let cfg = &state.config.stt;
    if bytes.len() > cfg.max_upload_bytes {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "clip exceeds upload limit");
    }
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported audio container",
        );
    }
    if bytes.len() < cfg.min_clip_bytes {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "clip too short to transcribe",
        );
    }

    // ── Persist the input ──────────────────────────────────────────
    let stt_session_id = uuid::Uuid::new_v4().to_string();
    let dir = match state.artifacts.stt_dir(&stt_session_id) {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!(error = %e, "cannot create STT session dir");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
        }
    };
    let input_path = dir.join(format!("input.{ext}"));
    if let Err(e) = tokio::fs::write(&input_path, &bytes).await {
        tracing::error!(error = %e, "cannot persist uploaded clip");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
    }

    // ── Forward to the opaque STT provider ─────────────────────────
    let upstream = match call_stt_provider(&state, &filename, &mime_type, bytes).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "upstream STT failure");
            return error_response(StatusCode::BAD_GATEWAY, "transcription provider failed");
        }
    };

    let transcript = upstream
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_owned();
    let duration_ms = upstream
        .get("duration")
        .and_then(|v| v.as_f64())
        .map(|s| (s * 1_000.0) as u64)
        .unwrap_or(0);

    // ── Persist transcripts + metadata (best-effort) ───────────────
    let transcript_path = dir.join("transcript.txt");
    let _ = tokio::fs::write(&transcript_path, &transcript).await;
    if let Ok(raw) = serde_json::to_string_pretty(&upstream) {
        let _ = tokio::fs::write(dir.join("transcript.json"), raw).await;
    }
    let metadata = serde_json::json!({
        "sttSessionId": stt_session_id,
        "receivedAt": chrono::Utc::now(),
        "mimeType": mime_type,
        "originalFilename": filename,
        "durationMs": duration_ms,
    });
    if let Ok(raw) = serde_json::to_string_pretty(&metadata) {
        let _ = tokio::fs::write(dir.join("metadata.json"), raw).await;
    }

    tracing::info!(
        stt_session_id = %stt_session_id,
        chars = transcript.len(),
        duration_ms,
        "clip transcribed"
    );

    Json(SttResponse {
        stt_session_id,
        transcript,
        audio_path: state.artifacts.rel_path(&input_path),
        transcript_path: state.artifacts.rel_path(&transcript_path),
        duration_ms,
        mime_type,
    })
    .into_response()
}

/// One multipart POST to an OpenAI-compatible `/v1/audio/transcriptions`.
async fn call_stt_provider(
    state: &AppState,
    filename: &str,
    mime_type: &str,
    bytes: Vec<u8>,
) -> rr_domain::error::Result<serde_json::Value> {
    use rr_domain::error::Error;

    let cfg = &state.config.stt;
    let api_key = std::env::var(&cfg.key_env)
        .map_err(|_| Error::Config(format!("environment variable '{}' not set", cfg.key_env)))?;

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(filename.to_owned())
        .mime_str(mime_type)
        .map_err(|e| Error::Other(format!("invalid mime type: {e}")))?;
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("model", cfg.model.clone())
        .text("response_format", "verbose_json");

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(cfg.timeout_s))
        .build()
        .map_err(|e| Error::Network(e.to_string()))?;

    let url = format!(
        "{}/v1/audio/transcriptions",
        cfg.base_url.trim_end_matches('/')
    );
    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .multipart(form)
        .send()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::Provider {
            provider: "stt".into(),
            status: status.as_u16(),
            message: text,
        });
    }
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_extensions_cover_the_recorder() {
        assert!(ACCEPTED_EXTENSIONS.contains(&"webm"));
        assert!(ACCEPTED_EXTENSIONS.contains(&"wav"));
        assert!(!ACCEPTED_EXTENSIONS.contains(&"exe"));
    }

    #[test]
    fn response_serializes_camel_case() {
        let resp = SttResponse {
            stt_session_id: "abc".into(),
            transcript: "hello water".into(),
            audio_path: "stt/sessions/abc/input.webm".into(),
            transcript_path: "stt/sessions/abc/transcript.txt".into(),
            duration_ms: 1_500,
            mime_type: "audio/webm".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["sttSessionId"], "abc");
        assert_eq!(json["durationMs"], 1_500);
        assert_eq!(json["mimeType"], "audio/webm");
    }
}
