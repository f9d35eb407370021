//! Shared API request/response types
//!
//! Field names follow the backend's JSON contract exactly (snake_case).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::Error;

// ========================================
// Enumerations
// ========================================

/// Backend job status
///
/// `Uploading` is never reported by the backend; the client uses it for the
/// placeholder snapshot while files are still being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
    /// Any status string this client does not know; treated as still active
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// True for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Uploading => write!(f, "uploading"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Mastering mode sent as `mastering_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteringMode {
    /// Match the target against a reference track (file or URL)
    Reference,
    /// Master without a reference, parameterized by genre
    Standalone,
}

impl std::fmt::Display for MasteringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MasteringMode::Reference => write!(f, "reference"),
            MasteringMode::Standalone => write!(f, "standalone"),
        }
    }
}

impl FromStr for MasteringMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(MasteringMode::Reference),
            "standalone" => Ok(MasteringMode::Standalone),
            other => Err(Error::InvalidInput(format!(
                "Unknown mastering mode '{}' (expected 'reference' or 'standalone')",
                other
            ))),
        }
    }
}

/// Genre used to parameterize standalone mastering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Genre {
    #[default]
    Pop,
    Rock,
    Electronic,
    HipHop,
    Jazz,
    Classical,
    Country,
    Blues,
    Folk,
}

impl Genre {
    /// Every genre the backend understands, in display order
    pub const ALL: [Genre; 9] = [
        Genre::Pop,
        Genre::Rock,
        Genre::Electronic,
        Genre::HipHop,
        Genre::Jazz,
        Genre::Classical,
        Genre::Country,
        Genre::Blues,
        Genre::Folk,
    ];

    /// Wire value (`hip-hop` for [`Genre::HipHop`])
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Pop => "pop",
            Genre::Rock => "rock",
            Genre::Electronic => "electronic",
            Genre::HipHop => "hip-hop",
            Genre::Jazz => "jazz",
            Genre::Classical => "classical",
            Genre::Country => "country",
            Genre::Blues => "blues",
            Genre::Folk => "folk",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Genre::Pop => "Pop",
            Genre::Rock => "Rock",
            Genre::Electronic => "Electronic",
            Genre::HipHop => "Hip-Hop",
            Genre::Jazz => "Jazz",
            Genre::Classical => "Classical",
            Genre::Country => "Country",
            Genre::Blues => "Blues",
            Genre::Folk => "Folk",
        }
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Genre::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == wanted || (wanted == "hiphop" && *g == Genre::HipHop))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown genre '{}'", s.trim())))
    }
}

/// Rendition requested in `output_formats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 16-bit PCM WAV
    Pcm16,
    /// 24-bit PCM WAV
    Pcm24,
    /// 320 kbps MP3
    Mp3,
}

impl OutputFormat {
    /// The fixed set this client always requests
    pub const REQUESTED: [OutputFormat; 3] =
        [OutputFormat::Pcm16, OutputFormat::Pcm24, OutputFormat::Mp3];
}

// ========================================
// Request / Response Bodies
// ========================================

/// `POST /api/upload` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResponse {
    /// Server-assigned filename; the handle used in job creation
    pub filename: String,

    #[serde(default)]
    pub file_id: Option<String>,

    /// Name of the file as sent by the client
    #[serde(default)]
    pub original_name: Option<String>,

    /// Stored size in bytes
    #[serde(default)]
    pub size: Option<u64>,
}

/// `POST /api/master` request body
///
/// Optional fields serialize as explicit `null`, matching what the backend
/// expects for absent references and genre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterJobRequest {
    pub target_file: String,
    pub reference_file: Option<String>,
    pub youtube_url: Option<String>,
    pub mastering_mode: MasteringMode,
    pub genre: Option<Genre>,
    pub output_formats: Vec<OutputFormat>,
}

impl MasterJobRequest {
    /// Reference-matching job; at least one of the reference inputs should be set
    pub fn reference(
        target_file: String,
        reference_file: Option<String>,
        youtube_url: Option<String>,
    ) -> Self {
        Self {
            target_file,
            reference_file,
            youtube_url,
            mastering_mode: MasteringMode::Reference,
            genre: None,
            output_formats: OutputFormat::REQUESTED.to_vec(),
        }
    }

    /// Standalone job; reference inputs are always omitted
    pub fn standalone(target_file: String, genre: Genre) -> Self {
        Self {
            target_file,
            reference_file: None,
            youtube_url: None,
            mastering_mode: MasteringMode::Standalone,
            genre: Some(genre),
            output_formats: OutputFormat::REQUESTED.to_vec(),
        }
    }
}

/// `POST /api/master` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,

    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// `GET /api/jobs/{job_id}` response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub job_id: Option<String>,

    pub status: JobStatus,

    /// Percentage as reported; may be out of range or fractional
    #[serde(default)]
    pub progress: f64,

    #[serde(default)]
    pub message: String,

    /// Present (and meaningful) only once the job completed
    #[serde(default)]
    pub output_files: Option<Vec<String>>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub completed_at: Option<String>,
}

impl JobStatusResponse {
    /// Progress rounded and clamped into 0..=100
    ///
    /// Non-finite values report 0.
    pub fn clamped_progress(&self) -> u8 {
        clamp_progress(self.progress)
    }
}

/// Round and clamp a reported percentage into 0..=100
pub fn clamp_progress(progress: f64) -> u8 {
    if !progress.is_finite() {
        return 0;
    }
    progress.round().clamp(0.0, 100.0) as u8
}

/// Error body returned with non-2xx responses
///
/// `detail` is usually a string but may be a structured validation report.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub detail: Value,
}

impl ApiErrorBody {
    /// Detail rendered as plain text
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_request_serializes_nulls() {
        let request = MasterJobRequest::reference(
            "abc.wav".to_string(),
            None,
            Some("https://www.youtube.com/watch?v=xyz".to_string()),
        );

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({
                "target_file": "abc.wav",
                "reference_file": null,
                "youtube_url": "https://www.youtube.com/watch?v=xyz",
                "mastering_mode": "reference",
                "genre": null,
                "output_formats": ["pcm16", "pcm24", "mp3"],
            })
        );
    }

    #[test]
    fn test_standalone_request_carries_genre() {
        let request = MasterJobRequest::standalone("abc.wav".to_string(), Genre::HipHop);
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["mastering_mode"], "standalone");
        assert_eq!(value["genre"], "hip-hop");
        assert!(value["reference_file"].is_null());
        assert!(value["youtube_url"].is_null());
    }

    #[test]
    fn test_job_status_response_tolerates_missing_fields() {
        let response: JobStatusResponse =
            serde_json::from_value(json!({"status": "processing", "progress": 30}))
                .expect("deserialize");

        assert_eq!(response.status, JobStatus::Processing);
        assert_eq!(response.clamped_progress(), 30);
        assert!(response.message.is_empty());
        assert!(response.output_files.is_none());
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let response: JobStatusResponse =
            serde_json::from_value(json!({"status": "queued", "progress": 0, "message": ""}))
                .expect("deserialize");

        assert_eq!(response.status, JobStatus::Unknown);
        assert!(!response.status.is_terminal());
    }

    #[test]
    fn test_progress_clamping() {
        assert_eq!(clamp_progress(-5.0), 0);
        assert_eq!(clamp_progress(150.0), 100);
        assert_eq!(clamp_progress(42.4), 42);
        assert_eq!(clamp_progress(f64::NAN), 0);
        assert_eq!(clamp_progress(f64::INFINITY), 0);
    }

    #[test]
    fn test_genre_parsing() {
        assert_eq!("jazz".parse::<Genre>().unwrap(), Genre::Jazz);
        assert_eq!("Hip-Hop".parse::<Genre>().unwrap(), Genre::HipHop);
        assert_eq!("hiphop".parse::<Genre>().unwrap(), Genre::HipHop);
        assert!("polka".parse::<Genre>().is_err());
        assert_eq!(Genre::default(), Genre::Pop);
    }

    #[test]
    fn test_error_body_message() {
        let body: ApiErrorBody =
            serde_json::from_value(json!({"detail": "Target file not found"})).unwrap();
        assert_eq!(body.message(), "Target file not found");

        let body: ApiErrorBody =
            serde_json::from_value(json!({"detail": [{"loc": ["body"], "msg": "missing"}]}))
                .unwrap();
        assert!(body.message().contains("missing"));
    }
}
