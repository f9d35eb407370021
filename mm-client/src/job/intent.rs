//! User intent for one mastering job and its validation

use mm_common::api::{Genre, MasterJobRequest, MasteringMode};

use crate::error::{Error, Result};
use crate::upload::LocalAudioFile;

/// What the user asked for, before any validation
#[derive(Debug, Clone, PartialEq)]
pub struct MasteringIntent {
    pub target: Option<LocalAudioFile>,
    pub reference_file: Option<LocalAudioFile>,
    /// Streaming-service URL the backend fetches itself
    pub reference_url: Option<String>,
    pub mode: MasteringMode,
    /// Only used in standalone mode
    pub genre: Genre,
}

impl MasteringIntent {
    /// Match `target` against a reference file and/or URL
    pub fn reference(
        target: LocalAudioFile,
        reference_file: Option<LocalAudioFile>,
        reference_url: Option<String>,
    ) -> Self {
        Self {
            target: Some(target),
            reference_file,
            reference_url,
            mode: MasteringMode::Reference,
            genre: Genre::default(),
        }
    }

    /// Master `target` on its own, tuned for `genre`
    pub fn standalone(target: LocalAudioFile, genre: Genre) -> Self {
        Self {
            target: Some(target),
            reference_file: None,
            reference_url: None,
            mode: MasteringMode::Standalone,
            genre,
        }
    }

    /// Check the intent and produce a submission plan
    ///
    /// Nothing here touches the network. In standalone mode the reference
    /// inputs are dropped even if present.
    pub fn validate(&self) -> Result<SubmissionPlan> {
        let target = self
            .target
            .clone()
            .ok_or_else(|| Error::Validation("Please upload a target file".to_string()))?;
        target.validate()?;

        match self.mode {
            MasteringMode::Standalone => Ok(SubmissionPlan {
                target,
                reference_file: None,
                reference_url: None,
                mode: MasteringMode::Standalone,
                genre: Some(self.genre),
            }),
            MasteringMode::Reference => {
                let reference_url = self
                    .reference_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string);

                if self.reference_file.is_none() && reference_url.is_none() {
                    return Err(Error::Validation(
                        "Please upload a reference file or provide a YouTube URL".to_string(),
                    ));
                }

                if let Some(reference) = &self.reference_file {
                    reference.validate()?;
                }

                Ok(SubmissionPlan {
                    target,
                    reference_file: self.reference_file.clone(),
                    reference_url,
                    mode: MasteringMode::Reference,
                    genre: None,
                })
            }
        }
    }
}

/// A validated intent, ready for upload and submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPlan {
    pub target: LocalAudioFile,
    pub reference_file: Option<LocalAudioFile>,
    pub reference_url: Option<String>,
    pub mode: MasteringMode,
    pub genre: Option<Genre>,
}

impl SubmissionPlan {
    /// Job creation body from the server-assigned upload handles
    pub fn request(&self, target_handle: String, reference_handle: Option<String>) -> MasterJobRequest {
        match self.mode {
            MasteringMode::Standalone => {
                MasterJobRequest::standalone(target_handle, self.genre.unwrap_or_default())
            }
            MasteringMode::Reference => MasterJobRequest::reference(
                target_handle,
                reference_handle,
                self.reference_url.clone(),
            ),
        }
    }
}
