//! Playback-related type definitions
//!
//! Supporting types for track selection, media sources and the playback
//! snapshot broadcast to observers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which of the two compared tracks is bound to the media element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSelection {
    /// The user's local, un-mastered file
    #[default]
    Original,
    /// The backend's mastered rendition
    Mastered,
}

impl std::fmt::Display for TrackSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackSelection::Original => write!(f, "original"),
            TrackSelection::Mastered => write!(f, "mastered"),
        }
    }
}

/// Where the media element reads audio from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaSource {
    /// Local file content, streamed without a network round trip
    Local {
        /// Path on disk
        path: PathBuf,
    },
    /// Backend download endpoint for one produced rendition
    Remote {
        /// Full download URL
        url: String,
        /// Output filename the URL points at
        filename: String,
    },
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaSource::Local { path } => write!(f, "{}", path.display()),
            MediaSource::Remote { url, .. } => write!(f, "{}", url),
        }
    }
}

/// Immutable view of a playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Source generation; bumps on every rebind
    pub generation: u64,
    pub selected_track: TrackSelection,
    /// Bound source; `None` means "not available" (not an error)
    pub source: Option<MediaSource>,
    pub is_playing: bool,
    pub is_muted: bool,
    /// Stored volume (0.0-1.0); unchanged by muting
    pub volume: f64,
    /// Volume actually applied to the element
    pub audible_volume: f64,
    /// Position in seconds
    pub current_time: f64,
    /// Duration in seconds, unknown until metadata loads
    pub duration: Option<f64>,
    pub loading: bool,
    /// Playback failure reason
    pub error: Option<String>,
}

impl PlaybackSnapshot {
    /// Position as a fraction of the duration (0.0 when duration is unknown)
    pub fn progress_fraction(&self) -> f64 {
        match self.duration {
            Some(d) if d.is_finite() && d > 0.0 => (self.current_time / d).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Transport controls accept input
    pub fn controls_enabled(&self) -> bool {
        self.source.is_some() && !self.loading && self.error.is_none()
    }
}
