//! Upload coordination
//!
//! Sends the target (and optional reference) file to the backend and returns
//! the server-assigned filename handles used for job creation. Audio content
//! is never inspected here; the backend's verdict is surfaced verbatim.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mm_common::formats::{is_supported_upload, SUPPORTED_UPLOAD_EXTENSIONS};
use mm_common::human_time::format_file_size;
use tracing::{debug, info};

use crate::api::MasteringBackend;
use crate::error::{Error, Result};

/// A local audio file chosen by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAudioFile {
    /// Path on disk
    pub path: PathBuf,
    /// Original file name, sent as the multipart file name
    pub name: String,
    /// Size in bytes at selection time
    pub size: u64,
}

impl LocalAudioFile {
    /// Describe a file without touching the filesystem
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name, size }
    }

    /// Stat `path` and describe it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            Error::Validation(format!("Cannot read {}: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(Error::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(Self::new(path, metadata.len()))
    }

    /// Check the upload constraints: non-empty, allow-listed extension
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::Validation(format!("{} is empty", self.name)));
        }

        if !is_supported_upload(&self.name) {
            return Err(Error::Validation(format!(
                "{} is not a supported audio file (expected one of: {})",
                self.name,
                SUPPORTED_UPLOAD_EXTENSIONS.join(", ")
            )));
        }

        Ok(())
    }

    /// MIME type sent with the multipart part
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "wav" => "audio/wav",
            "mp3" => "audio/mpeg",
            "flac" => "audio/flac",
            "aiff" | "aif" => "audio/aiff",
            _ => "application/octet-stream",
        }
    }
}

/// Handles returned by [`UploadCoordinator::upload_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFiles {
    pub target: String,
    pub reference: Option<String>,
}

/// Sequential uploader
#[derive(Clone)]
pub struct UploadCoordinator {
    backend: Arc<dyn MasteringBackend>,
}

impl UploadCoordinator {
    pub fn new(backend: Arc<dyn MasteringBackend>) -> Self {
        Self { backend }
    }

    /// Upload one file, returning the server-assigned filename
    ///
    /// Exactly one network call per invocation. Local constraint violations
    /// are reported before the call.
    pub async fn upload(&self, file: &LocalAudioFile) -> Result<String> {
        file.validate()?;

        debug!(
            file = %file.name,
            size = %format_file_size(file.size),
            "Uploading file"
        );

        let response = self.backend.upload(file).await?;

        info!(
            file = %file.name,
            handle = %response.filename,
            "Upload complete"
        );

        Ok(response.filename)
    }

    /// Upload target first, then the reference if one is given
    ///
    /// The first failure aborts the sequence; the reference is never sent if
    /// the target upload failed.
    pub async fn upload_all(
        &self,
        target: &LocalAudioFile,
        reference: Option<&LocalAudioFile>,
    ) -> Result<UploadedFiles> {
        let target = self.upload(target).await?;

        let reference = match reference {
            Some(file) => Some(self.upload(file).await?),
            None => None,
        };

        Ok(UploadedFiles { target, reference })
    }
}
