//! Error types for mm-client
//!
//! Defines the client error taxonomy using thiserror:
//! validation failures caught before any network call, transport failures
//! and backend-reported job failures. Playback failures never leave the
//! playback session; they live in `PlaybackSnapshot::error`.

use thiserror::Error;

/// Which network call a transport failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    Upload,
    Submit,
    Poll,
    Download,
}

impl std::fmt::Display for TransportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportStage::Upload => write!(f, "upload"),
            TransportStage::Submit => write!(f, "job submission"),
            TransportStage::Poll => write!(f, "status poll"),
            TransportStage::Download => write!(f, "download"),
        }
    }
}

/// Main error type for mm-client
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unusable local input, detected before contacting the backend
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network or HTTP failure
    #[error("Transport error during {stage}: {message}")]
    Transport {
        stage: TransportStage,
        message: String,
    },

    /// Backend reported the job as failed
    #[error("Mastering failed: {0}")]
    BackendJobFailure(String),

    /// The operation belonged to a job that was cancelled or replaced
    #[error("Job was cancelled or superseded by a newer job")]
    Superseded,

    /// No job has been started in this session
    #[error("No active job")]
    NoActiveJob,

    /// A playback session task is no longer running
    #[error("Playback session closed")]
    SessionClosed,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// mm-common error
    #[error("Common error: {0}")]
    Common(#[from] mm_common::Error),
}

impl Error {
    /// Build a transport error for `stage`
    pub fn transport(stage: TransportStage, message: impl Into<String>) -> Self {
        Error::Transport {
            stage,
            message: message.into(),
        }
    }
}

/// Convenience Result type using mm-client Error
pub type Result<T> = std::result::Result<T, Error>;
