//! Downloading produced renditions

use std::path::{Path, PathBuf};

use mm_common::human_time::format_file_size;
use mm_common::OutputFileKind;
use tracing::info;

use crate::api::HttpBackend;
use crate::error::Result;

/// One file written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub kind: OutputFileKind,
    pub path: PathBuf,
    pub size: u64,
}

impl DownloadedFile {
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}

/// Download `files` of `job_id` into `dest_dir`, in order
///
/// Stops at the first failure; files already written stay on disk.
pub async fn download_outputs(
    backend: &HttpBackend,
    job_id: &str,
    files: &[String],
    dest_dir: &Path,
) -> Result<Vec<DownloadedFile>> {
    let mut downloaded = Vec::with_capacity(files.len());

    for filename in files {
        let path = backend.download(job_id, filename, dest_dir).await?;
        let size = tokio::fs::metadata(&path).await?.len();
        let kind = OutputFileKind::classify(filename);

        info!(
            job_id,
            file = %filename,
            kind = kind.label(),
            size = %format_file_size(size),
            "Saved mastered file"
        );

        downloaded.push(DownloadedFile {
            filename: filename.clone(),
            kind,
            path,
            size,
        });
    }

    Ok(downloaded)
}
