//! The renderer-facing event subsystem: readiness aggregation plus the
//! single-client push channel.

pub mod orchestrator;
pub mod push;

pub use orchestrator::{spawn, Control, EventsHandle, SummaryInfo};
pub use push::PushChannel;
