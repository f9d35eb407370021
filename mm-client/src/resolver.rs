//! Media source resolution
//!
//! Decides what the media element should stream for a given track
//! selection. Pure: no I/O, no state beyond the preference policy.

use std::path::PathBuf;

use mm_common::events::{MediaSource, TrackSelection};
use mm_common::formats::FALLBACK_MASTERED_FILENAME;
use mm_common::OutputFileKind;
use reqwest::Url;

use crate::api::download_url;

/// Default rendition preference: compressed first, then deepest lossless
pub const DEFAULT_PREFERENCE: [OutputFileKind; 3] = [
    OutputFileKind::Mp3,
    OutputFileKind::Pcm24,
    OutputFileKind::Pcm16,
];

/// Outputs of a completed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasteredOutputs {
    pub job_id: String,
    pub output_files: Vec<String>,
}

/// Everything the resolver may pick from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInputs {
    /// User's local file
    pub original: Option<PathBuf>,
    /// Set only once the job completed
    pub mastered: Option<MasteredOutputs>,
}

/// Picks one source per track selection
#[derive(Debug, Clone)]
pub struct MediaSourceResolver {
    base_url: Url,
    preference: Vec<OutputFileKind>,
    fallback: String,
}

impl MediaSourceResolver {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            preference: DEFAULT_PREFERENCE.to_vec(),
            fallback: FALLBACK_MASTERED_FILENAME.to_string(),
        }
    }

    /// Replace the rendition preference order
    pub fn with_preference(mut self, preference: Vec<OutputFileKind>) -> Self {
        self.preference = preference;
        self
    }

    pub fn preference(&self) -> &[OutputFileKind] {
        &self.preference
    }

    /// Source for `selection`, or `None` when nothing is available yet
    pub fn resolve(&self, selection: TrackSelection, inputs: &SourceInputs) -> Option<MediaSource> {
        match selection {
            TrackSelection::Original => inputs
                .original
                .as_ref()
                .map(|path| MediaSource::Local { path: path.clone() }),
            TrackSelection::Mastered => {
                let mastered = inputs.mastered.as_ref()?;
                let filename = self.pick_mastered_file(&mastered.output_files);
                let url = download_url(&self.base_url, &mastered.job_id, filename);
                Some(MediaSource::Remote {
                    url: url.to_string(),
                    filename: filename.to_string(),
                })
            }
        }
    }

    /// First file matching the preference order, else the fallback name
    ///
    /// Within one kind the backend's listing order wins.
    pub fn pick_mastered_file<'a>(&'a self, output_files: &'a [String]) -> &'a str {
        self.preference
            .iter()
            .find_map(|kind| {
                output_files
                    .iter()
                    .find(|f| OutputFileKind::classify(f) == *kind)
            })
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }
}
