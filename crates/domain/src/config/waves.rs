use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wave decomposition pool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavesConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Number of dedicated decomposition worker threads.
    #[serde(default = "d_max_workers")]
    pub max_workers: usize,
    /// Bounded job queue capacity; overflow drops jobs, never blocks.
    #[serde(default = "d_queue_max_size")]
    pub queue_max_size: usize,
    /// Per-job wall-clock deadline in seconds.
    #[serde(default = "d_job_timeout_s")]
    pub job_timeout_s: u64,
    /// Fixed processing sample rate for the DSP pipeline.
    #[serde(default = "d_processing_sr")]
    pub processing_sr: u32,
}

impl Default for WavesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_workers: d_max_workers(),
            queue_max_size: d_queue_max_size(),
            job_timeout_s: d_job_timeout_s(),
            processing_sr: d_processing_sr(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_max_workers() -> usize {
    2
}
fn d_queue_max_size() -> usize {
    32
}
fn d_job_timeout_s() -> u64 {
    60
}
fn d_processing_sr() -> u32 {
    8_000
}
