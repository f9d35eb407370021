//! # MatchMaster client library
//!
//! Client side of the MatchMaster mastering service:
//! - [`UploadCoordinator`] sends local audio files to the backend
//! - [`JobOrchestrator`] drives one mastering job from upload to a terminal
//!   status, publishing snapshots on the shared [`EventBus`](mm_common::events::EventBus)
//! - [`MediaSourceResolver`] picks the rendition to stream for a track
//! - [`PlaybackController`] compares the original and mastered tracks on a
//!   single media element

pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod job;
pub mod playback;
pub mod resolver;
pub mod upload;

pub use api::{HttpBackend, MasteringBackend};
pub use config::{ClientConfig, ConfigOverrides};
pub use error::{Error, Result, TransportStage};
pub use job::{JobOrchestrator, MasteringIntent, PollPolicy};
pub use playback::{spawn_session, MediaElement, PlaybackController, PlaybackHandle};
pub use resolver::MediaSourceResolver;
pub use upload::{LocalAudioFile, UploadCoordinator};
