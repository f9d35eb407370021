//! API module for the mastering service HTTP contract
//!
//! Request/response types exchanged with the backend. The client crate wraps
//! these with its reqwest transport; nothing here performs I/O.
//!
//! # Endpoints
//!
//! - `POST /api/upload` (multipart `file`) → [`UploadResponse`]
//! - `POST /api/master` ([`MasterJobRequest`]) → [`CreateJobResponse`]
//! - `GET /api/jobs/{job_id}` → [`JobStatusResponse`]
//! - `GET /api/download/{job_id}/{filename}` → binary audio stream

pub mod types;

pub use types::{
    ApiErrorBody, CreateJobResponse, Genre, JobStatus, JobStatusResponse, MasterJobRequest,
    MasteringMode, OutputFormat, UploadResponse,
};
