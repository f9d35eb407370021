//! Output file format classification
//!
//! The backend encodes the rendition of each produced file in its name:
//! `pcm16` / `pcm24` for WAV bit depths and a `.mp3` extension for the
//! compressed copy. Labeling and source preference both rely on this
//! substring convention, so it lives in one place.

use serde::{Deserialize, Serialize};

/// Audio container extensions accepted for upload (lowercase, no dot)
pub const SUPPORTED_UPLOAD_EXTENSIONS: [&str; 5] = ["wav", "mp3", "flac", "aiff", "aif"];

/// Name assumed for the mastered rendition when a completed job lists no
/// recognizable output
pub const FALLBACK_MASTERED_FILENAME: &str = "mastered_pcm16.wav";

/// Rendition kind derived from an output filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFileKind {
    /// Compressed lossy (`.mp3`)
    Mp3,
    /// 24-bit lossless (`pcm24`)
    Pcm24,
    /// 16-bit lossless (`pcm16`)
    Pcm16,
    /// Anything else
    Other,
}

impl OutputFileKind {
    /// Classify a filename by substring
    ///
    /// The compressed check runs first so `mastered_pcm24.mp3` counts as MP3.
    pub fn classify(filename: &str) -> Self {
        if filename.contains(".mp3") {
            OutputFileKind::Mp3
        } else if filename.contains("pcm24") {
            OutputFileKind::Pcm24
        } else if filename.contains("pcm16") {
            OutputFileKind::Pcm16
        } else {
            OutputFileKind::Other
        }
    }

    /// Display label used next to download entries
    pub fn label(&self) -> &'static str {
        match self {
            OutputFileKind::Mp3 => "MP3 (320kbps)",
            OutputFileKind::Pcm24 => "WAV 24-bit",
            OutputFileKind::Pcm16 => "WAV 16-bit",
            OutputFileKind::Other => "Audio File",
        }
    }
}

/// True when the file name carries an allow-listed audio extension
pub fn is_supported_upload(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_UPLOAD_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
