//! Job orchestration type definitions
//!
//! Supporting types for the job lifecycle snapshot broadcast to observers.

use serde::{Deserialize, Serialize};

use crate::api::JobStatus;

/// Orchestrator phase
///
/// `Idle → Uploading → Submitting → Polling → {Completed | Failed}`.
/// `Completed` and `Failed` are terminal: nothing moves out of them except a
/// fresh start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Idle,
    Uploading,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl JobPhase {
    /// True for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed)
    }

    /// True while a chain of network calls is in flight
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobPhase::Uploading | JobPhase::Submitting | JobPhase::Polling
        )
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Idle => write!(f, "idle"),
            JobPhase::Uploading => write!(f, "uploading"),
            JobPhase::Submitting => write!(f, "submitting"),
            JobPhase::Polling => write!(f, "polling"),
            JobPhase::Completed => write!(f, "completed"),
            JobPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network or HTTP failure while uploading, submitting or polling
    Transport,
    /// Backend reported `status = failed`
    Backend,
}

/// Immutable view of the active job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Start generation this snapshot belongs to
    pub generation: u64,
    /// Orchestrator phase
    pub phase: JobPhase,
    /// Backend job identifier (known once submission succeeded)
    pub job_id: Option<String>,
    /// Last status (backend-reported once polling)
    pub status: JobStatus,
    /// Progress percentage, always within 0..=100
    pub progress: u8,
    /// Human-readable status text
    pub message: String,
    /// Produced filenames; empty unless the job completed
    pub output_files: Vec<String>,
    /// Failure classification when `phase == Failed`
    pub failure: Option<FailureKind>,
}

impl JobSnapshot {
    /// Snapshot of an orchestrator that has never started
    pub fn idle() -> Self {
        Self {
            generation: 0,
            phase: JobPhase::Idle,
            job_id: None,
            status: JobStatus::Pending,
            progress: 0,
            message: String::new(),
            output_files: Vec::new(),
            failure: None,
        }
    }

    /// Failure reason, present only for failed jobs
    pub fn error(&self) -> Option<&str> {
        match self.phase {
            JobPhase::Failed => Some(self.message.as_str()),
            _ => None,
        }
    }
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
