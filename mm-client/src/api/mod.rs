//! Mastering service transport
//!
//! [`MasteringBackend`] is the seam between the orchestration logic and the
//! HTTP contract. [`HttpBackend`] is the production implementation; tests
//! substitute scripted backends.

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use mm_common::api::{CreateJobResponse, JobStatusResponse, MasterJobRequest, UploadResponse};
use reqwest::Url;

use crate::error::{Error, Result};
use crate::upload::LocalAudioFile;

/// Operations the mastering service exposes
#[async_trait]
pub trait MasteringBackend: Send + Sync {
    /// `POST /api/upload` with the file as multipart field `file`
    async fn upload(&self, file: &LocalAudioFile) -> Result<UploadResponse>;

    /// `POST /api/master`
    async fn create_job(&self, request: &MasterJobRequest) -> Result<CreateJobResponse>;

    /// `GET /api/jobs/{job_id}`
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse>;
}

/// Parse and check a backend base URL
///
/// Only `http` and `https` bases are accepted.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Validation(format!("Invalid server URL '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(Error::Validation(format!(
            "Server URL '{}' must be an http(s) URL",
            raw
        )));
    }

    Ok(url)
}

/// Append path segments to `base`
///
/// Segments are percent-encoded, so job ids and filenames cannot escape
/// their position in the path.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// `GET /api/download/{job_id}/{filename}` under `base`
///
/// Used both for streaming playback and for saving files to disk.
pub fn download_url(base: &Url, job_id: &str, filename: &str) -> Url {
    endpoint(base, &["api", "download", job_id, filename])
}
