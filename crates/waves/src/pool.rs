//! The bounded CPU worker pool.
//!
//! Submission is fire-and-forget: `submit` never blocks, and a full queue
//! drops the job with a warning. Results always flow to the event
//! orchestrator over the async channel handed to [`WavePool::start`],
//! even when the originating request has long since returned.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use rr_domain::config::WavesConfig;
use rr_domain::wave::{WaveJob, WaveJobResult};

use crate::dsp::decompose_clip;

pub struct WavePool {
    job_tx: crossbeam_channel::Sender<WaveJob>,
    /// A zero-capacity crossbeam channel is a rendezvous channel whose
    /// `try_send` succeeds whenever a worker is parked on `recv`; the
    /// contract here is "capacity 0 accepts nothing", so it is enforced
    /// explicitly.
    queue_capacity: usize,
    /// Kept so the threads are owned somewhere; they exit when the job
    /// sender drops.
    _workers: Vec<std::thread::JoinHandle<()>>,
}

impl WavePool {
    /// Spawn the worker threads. `result_tx` is the pool's only output.
    pub fn start(
        config: &WavesConfig,
        artifacts_root: PathBuf,
        result_tx: mpsc::UnboundedSender<WaveJobResult>,
    ) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<WaveJob>(config.queue_max_size);
        let job_timeout = Duration::from_secs(config.job_timeout_s);
        let processing_sr = config.processing_sr;

        let workers = (0..config.max_workers.max(1))
            .map(|worker_idx| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let artifacts_root = artifacts_root.clone();
                std::thread::Builder::new()
                    .name(format!("wave-worker-{worker_idx}"))
                    .spawn(move || {
                        worker_loop(
                            worker_idx,
                            job_rx,
                            result_tx,
                            processing_sr,
                            job_timeout,
                            artifacts_root,
                        )
                    })
                    .expect("spawning wave worker thread")
            })
            .collect();

        tracing::info!(
            workers = config.max_workers.max(1),
            queue = config.queue_max_size,
            timeout_s = config.job_timeout_s,
            "wave pool started"
        );

        Self {
            job_tx,
            queue_capacity: config.queue_max_size,
            _workers: workers,
        }
    }

    /// Enqueue a job. Returns `false` when the queue is full and the job
    /// was dropped; the caller must not treat that as fatal.
    pub fn submit(&self, job: WaveJob) -> bool {
        if self.queue_capacity == 0 {
            tracing::warn!(
                session_id = %job.session_id,
                turn = job.turn_index.number(),
                slot = %job.source_slot_id,
                "wave queue capacity is 0, dropping job"
            );
            return false;
        }
        match self.job_tx.try_send(job) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(job)) => {
                tracing::warn!(
                    session_id = %job.session_id,
                    turn = job.turn_index.number(),
                    slot = %job.source_slot_id,
                    "wave queue full, dropping job"
                );
                false
            }
            Err(crossbeam_channel::TrySendError::Disconnected(job)) => {
                tracing::warn!(
                    session_id = %job.session_id,
                    "wave pool is shut down, dropping job"
                );
                false
            }
        }
    }
}

fn worker_loop(
    worker_idx: usize,
    job_rx: crossbeam_channel::Receiver<WaveJob>,
    result_tx: mpsc::UnboundedSender<WaveJobResult>,
    processing_sr: u32,
    job_timeout: Duration,
    artifacts_root: PathBuf,
) {
    for job in job_rx.iter() {
        let started = Instant::now();
        let deadline = started + job_timeout;

        tracing::debug!(
            worker = worker_idx,
            session_id = %job.session_id,
            turn = job.turn_index.number(),
            slot = %job.source_slot_id,
            "decomposing clip"
        );

        let outcome = decompose_clip(&job, processing_sr, deadline, &artifacts_root);
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(tracks) => {
                tracing::info!(
                    worker = worker_idx,
                    session_id = %job.session_id,
                    turn = job.turn_index.number(),
                    slot = %job.source_slot_id,
                    tracks = tracks.len(),
                    duration_ms,
                    "wave job complete"
                );
                WaveJobResult {
                    job,
                    tracks,
                    success: true,
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                tracing::warn!(
                    worker = worker_idx,
                    session_id = %job.session_id,
                    turn = job.turn_index.number(),
                    slot = %job.source_slot_id,
                    duration_ms,
                    error = %e,
                    "wave job failed"
                );
                WaveJobResult {
                    job,
                    tracks: Vec::new(),
                    success: false,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        };

        // The consumer may already be gone during shutdown.
        let _ = result_tx.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_domain::slot::{SlotId, TurnIndex};
    use std::f32::consts::TAU;
    use std::path::Path;

    fn write_tone(path: &Path, freq: f32, sr: u32, seconds: f32) {
        let samples: Vec<f32> = (0..(sr as f32 * seconds) as usize)
            .map(|i| (TAU * freq * i as f32 / sr as f32).sin() * 0.5)
            .collect();
        crate::wav::write_wav_mono(path, &samples, sr).unwrap();
    }

    fn test_config() -> WavesConfig {
        WavesConfig {
            enabled: true,
            max_workers: 2,
            queue_max_size: 8,
            job_timeout_s: 30,
            processing_sr: 8_000,
        }
    }

    fn job(dir: &Path, clip: &str) -> WaveJob {
        WaveJob::new(
            "sid".into(),
            TurnIndex::Respond,
            SlotId::new(2).unwrap(),
            dir.join(clip),
            dir.join("out"),
        )
    }

    #[tokio::test]
    async fn submitted_job_publishes_a_result() {
        let dir = tempfile::tempdir().unwrap();
        write_tone(&dir.path().join("clip.wav"), 330.0, 8_000, 0.4);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = WavePool::start(&test_config(), dir.path().to_path_buf(), tx);

        assert!(pool.submit(job(dir.path(), "clip.wav")));

        let result = rx.recv().await.expect("result");
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.tracks.len(), 2);
        for track in &result.tracks {
            assert!(Path::new(&track.abs_path).exists());
        }
    }

    #[tokio::test]
    async fn failed_decomposition_still_publishes() {
        let dir = tempfile::tempdir().unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = WavePool::start(&test_config(), dir.path().to_path_buf(), tx);

        // No such clip on disk.
        assert!(pool.submit(job(dir.path(), "missing.wav")));

        let result = rx.recv().await.expect("result");
        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(result.tracks.is_empty());
    }

    #[tokio::test]
    async fn zero_capacity_queue_drops_jobs() {
        let dir = tempfile::tempdir().unwrap();
        write_tone(&dir.path().join("clip.wav"), 330.0, 8_000, 0.4);

        let config = WavesConfig {
            queue_max_size: 0,
            ..test_config()
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = WavePool::start(&config, dir.path().to_path_buf(), tx);

        // A zero-capacity queue can never accept: submit drops, never blocks.
        assert!(!pool.submit(job(dir.path(), "clip.wav")));
    }
}
