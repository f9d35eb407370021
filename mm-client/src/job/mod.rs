//! Mastering job orchestration

mod intent;
mod orchestrator;
mod poll;

pub use intent::{MasteringIntent, SubmissionPlan};
pub use orchestrator::JobOrchestrator;
pub use poll::{PollPolicy, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL};
