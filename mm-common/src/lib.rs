//! # MatchMaster Common Library
//!
//! Shared code for the MatchMaster client crates including:
//! - Wire types for the mastering service HTTP contract
//! - Job and playback snapshot types plus the event bus (MmEvent enum)
//! - Output file format classification
//! - Bootstrap configuration loading
//! - Display time formatting

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod formats;
pub mod human_time;

pub use error::{Error, Result};
pub use formats::OutputFileKind;
