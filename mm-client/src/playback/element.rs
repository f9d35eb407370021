//! Media element abstraction
//!
//! The controller drives an element through fire-and-forget primitives and
//! learns about the outcome through [`MediaEvent`] notifications. Every
//! notification carries the generation passed to the `load()` that produced
//! it, so notifications from a replaced source can be told apart.

use mm_common::events::MediaSource;
use tokio::sync::mpsc;

/// Source generation tag
pub type Generation = u64;

/// Notification from the media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Fetching of the bound source began
    LoadStarted,
    /// Duration is known (may be infinite for live streams)
    MetadataLoaded { duration: f64 },
    /// Enough data is buffered to start playing
    CanPlay,
    /// Playback position moved
    TimeUpdate { current_time: f64 },
    /// Playback reached the end of the source
    Ended,
    /// Loading or decoding failed
    Error { reason: String },
    /// A play attempt succeeded
    PlayStarted,
    /// A play attempt was refused (autoplay policy, device busy, ...)
    PlayRejected { reason: String },
    Paused,
}

/// A notification tagged with the source generation it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedMediaEvent {
    pub generation: Generation,
    pub event: MediaEvent,
}

/// Playback primitives of one audio element
///
/// Implementations must not block: outcomes are reported later through a
/// [`MediaEventSender`].
pub trait MediaElement: Send {
    /// Bind `source`, replacing (and stopping) whatever was bound
    fn load(&mut self, source: &MediaSource, generation: Generation);

    /// Unbind the current source
    fn unload(&mut self);

    /// Attempt to start playback; answered by `PlayStarted` or `PlayRejected`
    fn play(&mut self);

    fn pause(&mut self);

    /// Move to `position` seconds
    fn seek(&mut self, position: f64);

    /// Audible output level (0.0-1.0)
    fn set_volume(&mut self, volume: f64);
}

/// Sending side handed to element implementations
#[derive(Debug, Clone)]
pub struct MediaEventSender {
    tx: mpsc::UnboundedSender<TaggedMediaEvent>,
}

impl MediaEventSender {
    /// New sender plus the receiver consumed by the playback session
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaggedMediaEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the session is gone
    pub fn send(&self, generation: Generation, event: MediaEvent) -> bool {
        self.tx
            .send(TaggedMediaEvent { generation, event })
            .is_ok()
    }
}
