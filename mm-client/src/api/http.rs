//! reqwest implementation of the mastering service contract
//!
//! The configured timeout bounds connection setup and each JSON call as a
//! whole. File transfers have no overall deadline; a download fails only
//! when no data arrives for a full timeout period.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mm_common::api::{
    ApiErrorBody, CreateJobResponse, JobStatusResponse, MasterJobRequest, UploadResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, Url};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use super::{download_url, endpoint, MasteringBackend};
use crate::error::{Error, Result, TransportStage};
use crate::upload::LocalAudioFile;

const USER_AGENT: &str = concat!("matchmaster-client/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the mastering service
#[derive(Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Validation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stream one produced file into `dest_dir`
    ///
    /// Only the final path component of `filename` is used on disk. Returns
    /// the written path. A failed transfer leaves no file behind.
    pub async fn download(&self, job_id: &str, filename: &str, dest_dir: &Path) -> Result<PathBuf> {
        let stage = TransportStage::Download;
        let local_name = Path::new(filename)
            .file_name()
            .ok_or_else(|| Error::Validation(format!("Invalid output filename '{}'", filename)))?;
        let dest = dest_dir.join(local_name);

        let url = download_url(&self.base_url, job_id, filename);
        tracing::debug!(job_id, filename, url = %url, "Downloading output file");

        let response = tokio::time::timeout(self.timeout, self.http_client.get(url).send())
            .await
            .map_err(|_| Error::transport(stage, "Timed out waiting for response"))?
            .map_err(|e| Error::transport(stage, e.to_string()))?;
        let response = check_status(response, stage).await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let written = match self.write_body(response, &dest).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&dest).await {
                    tracing::warn!(
                        path = %dest.display(),
                        error = %remove_err,
                        "Failed to remove partial download"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            job_id,
            path = %dest.display(),
            bytes = written,
            "Download complete"
        );

        Ok(dest)
    }

    /// Stream `response` into a new file at `dest`
    ///
    /// Fails if the server stalls for longer than the timeout between chunks.
    async fn write_body(&self, response: Response, dest: &Path) -> Result<u64> {
        let stage = TransportStage::Download;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = tokio::time::timeout(self.timeout, stream.next())
                .await
                .map_err(|_| {
                    Error::transport(
                        stage,
                        format!("No data received for {}s", self.timeout.as_secs_f32()),
                    )
                })?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| Error::transport(stage, e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl MasteringBackend for HttpBackend {
    async fn upload(&self, file: &LocalAudioFile) -> Result<UploadResponse> {
        let stage = TransportStage::Upload;
        let handle = tokio::fs::File::open(&file.path).await?;
        let length = handle.metadata().await?.len();

        let part = Part::stream_with_length(Body::from(handle), length)
            .file_name(file.name.clone())
            .mime_str(file.mime_type())
            .map_err(|e| Error::transport(stage, e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .http_client
            .post(endpoint(&self.base_url, &["api", "upload"]))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::transport(stage, e.to_string()))?;

        parse_json(response, stage).await
    }

    async fn create_job(&self, request: &MasterJobRequest) -> Result<CreateJobResponse> {
        let stage = TransportStage::Submit;

        tracing::debug!(
            target_file = %request.target_file,
            mode = %request.mastering_mode,
            "Submitting mastering job"
        );

        let response = self
            .http_client
            .post(endpoint(&self.base_url, &["api", "master"]))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::transport(stage, e.to_string()))?;

        parse_json(response, stage).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let stage = TransportStage::Poll;

        let response = self
            .http_client
            .get(endpoint(&self.base_url, &["api", "jobs", job_id]))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::transport(stage, e.to_string()))?;

        parse_json(response, stage).await
    }
}

/// Turn a non-2xx response into a transport error carrying the backend detail
async fn check_status(response: Response, stage: TransportStage) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => body.message(),
        Err(_) if !text.trim().is_empty() => text,
        Err(_) => format!("HTTP {}", status),
    };

    tracing::warn!(%stage, status = status.as_u16(), %message, "Backend rejected request");
    Err(Error::transport(stage, message))
}

async fn parse_json<T: DeserializeOwned>(response: Response, stage: TransportStage) -> Result<T> {
    let response = check_status(response, stage).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| Error::transport(stage, format!("Malformed response: {}", e)))
}
