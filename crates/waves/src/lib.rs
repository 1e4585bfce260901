//! Wave decomposition: a bounded CPU worker pool that turns each rendered
//! speech clip into low-frequency cosine-synthesised wave tracks, one per
//! target speaker slot.
//!
//! The pool is deliberately kept off the request path's scheduler: jobs are
//! submitted fire-and-forget over a bounded queue, run on dedicated OS
//! threads, and publish results onto an async channel consumed by the
//! event orchestrator — never back through the submitter.

mod dsp;
mod pitch;
mod pool;
mod resample;
mod wav;

pub use dsp::decompose_clip;
pub use pool::WavePool;
