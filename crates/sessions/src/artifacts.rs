//! Artifact/session store: owns the on-disk layout for TTS clips, wave
//! tracks, STT sessions, and manifests.
//!
//! ```text
//! artifacts/
//!   tts/sessions/<sid>/turn_<n>/…  summary/…  session.json
//!   waves/sessions/<sid>/turn_<n>/…  summary/…
//!   stt/sessions/<ssid>/input.<ext>  transcript.json  transcript.txt  metadata.json
//! ```
//!
//! Paths are deterministic given session id, turn, slot, agent, and voice
//! profile, so consumers can compute them before files exist. Manifest
//! writes are best-effort and never fail the request.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rr_domain::agent::AgentId;
use rr_domain::error::{Error, Result};
use rr_domain::slot::{SlotId, TurnIndex};
use rr_domain::voice::VoiceProfile;

pub struct SessionStore {
    root: PathBuf,
    /// Monotonic suffix source so same-second re-renders never collide.
    counter: AtomicU64,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(Error::Io)?;
        Ok(Self {
            root,
            counter: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a new session identity and create its directory roots.
    pub fn begin(&self) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        std::fs::create_dir_all(self.root.join("tts/sessions").join(&session_id))
            .map_err(Error::Io)?;
        std::fs::create_dir_all(self.root.join("waves/sessions").join(&session_id))
            .map_err(Error::Io)?;
        tracing::debug!(session_id = %session_id, "session artifact dirs created");
        Ok(session_id)
    }

    // ── Directory layout ───────────────────────────────────────────

    fn turn_dir_name(turn: TurnIndex) -> String {
        match turn {
            TurnIndex::Summary => "summary".into(),
            other => format!("turn_{}", other.number()),
        }
    }

    /// TTS clip directory for a turn; created on demand.
    pub fn tts_dir(&self, session_id: &str, turn: TurnIndex) -> Result<PathBuf> {
        let dir = self
            .root
            .join("tts/sessions")
            .join(session_id)
            .join(Self::turn_dir_name(turn));
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(dir)
    }

    /// Wave track directory for a turn; created on demand.
    pub fn wave_dir(&self, session_id: &str, turn: TurnIndex) -> Result<PathBuf> {
        let dir = self
            .root
            .join("waves/sessions")
            .join(session_id)
            .join(Self::turn_dir_name(turn));
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(dir)
    }

    /// STT session directory; created on demand.
    pub fn stt_dir(&self, stt_session_id: &str) -> Result<PathBuf> {
        let dir = self.root.join("stt/sessions").join(stt_session_id);
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(dir)
    }

    // ── Filenames ──────────────────────────────────────────────────

    /// Deterministic clip filename:
    /// `<slot>_<agent>_<profile>[_comment_to_slot-<t>]_<seq>.wav`
    pub fn clip_filename(
        &self,
        slot: SlotId,
        agent: AgentId,
        profile: VoiceProfile,
        comment_target: Option<SlotId>,
    ) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let base = match comment_target {
            Some(target) => format!(
                "{slot}_{agent}_{profile}_comment_to_slot-{target}_{seq:04}",
            ),
            None => format!("{slot}_{agent}_{profile}_{seq:04}"),
        };
        format!("{}.wav", sanitize(&base))
    }

    /// Summary clip filename: `<agent>_<profile>_<seq>.wav`.
    pub fn summary_filename(&self, agent: AgentId, profile: VoiceProfile) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}.wav", sanitize(&format!("{agent}_{profile}_{seq:04}")))
    }

    /// Path relative to the artifacts root, as served by `/v1/audio`.
    pub fn rel_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    // ── Manifest ───────────────────────────────────────────────────

    /// Write `session.json` under the TTS session dir. Best-effort: a
    /// failure is logged and swallowed.
    pub fn write_manifest(&self, session_id: &str, payload: &serde_json::Value) {
        let path = self
            .root
            .join("tts/sessions")
            .join(session_id)
            .join("session.json");
        let pretty = match serde_json::to_string_pretty(payload) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "manifest serialization failed");
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, pretty) {
            tracing::warn!(path = %path.display(), error = %e, "manifest write failed");
        }
    }
}

/// Collapse anything outside `[A-Za-z0-9._-]` to `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("artifacts")).unwrap();
        (dir, store)
    }

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    #[test]
    fn begin_creates_session_roots() {
        let (_tmp, store) = store();
        let sid = store.begin().unwrap();
        assert!(store.root().join("tts/sessions").join(&sid).is_dir());
        assert!(store.root().join("waves/sessions").join(&sid).is_dir());
    }

    #[test]
    fn turn_dirs_are_stable() {
        let (_tmp, store) = store();
        let sid = store.begin().unwrap();
        let d1 = store.tts_dir(&sid, TurnIndex::Comment).unwrap();
        let d2 = store.tts_dir(&sid, TurnIndex::Comment).unwrap();
        assert_eq!(d1, d2);
        assert!(d1.ends_with("turn_2"));
        let summary = store.wave_dir(&sid, TurnIndex::Summary).unwrap();
        assert!(summary.ends_with("summary"));
    }

    #[test]
    fn clip_filenames_are_unique_and_sanitised() {
        let (_tmp, store) = store();
        let a = store.clip_filename(
            slot(2),
            AgentId::Mist,
            VoiceProfile::CalmSoothing,
            Some(slot(5)),
        );
        let b = store.clip_filename(
            slot(2),
            AgentId::Mist,
            VoiceProfile::CalmSoothing,
            Some(slot(5)),
        );
        assert_ne!(a, b);
        assert!(a.contains("comment_to_slot-5"));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()
            || matches!(c, '.' | '_' | '-')));
    }

    #[test]
    fn rel_path_strips_root() {
        let (_tmp, store) = store();
        let sid = store.begin().unwrap();
        let dir = store.tts_dir(&sid, TurnIndex::Respond).unwrap();
        let rel = store.rel_path(&dir.join("clip.wav"));
        assert!(rel.starts_with("tts/sessions/"));
        assert!(rel.ends_with("turn_1/clip.wav"));
    }

    #[test]
    fn manifest_write_is_best_effort() {
        let (_tmp, store) = store();
        // Session dir was never created: the write fails but must not panic.
        store.write_manifest("missing-session", &serde_json::json!({ "ok": true }));
    }

    #[test]
    fn sanitize_collapses_strange_chars() {
        assert_eq!(sanitize("a b/c:d"), "a_b_c_d");
        assert_eq!(sanitize("ok-1.2_x"), "ok-1.2_x");
    }
}
