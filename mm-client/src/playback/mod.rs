//! Original-versus-mastered playback
//!
//! [`PlaybackController`] is the state machine; [`spawn_session`] runs it
//! on a task fed by channels.

mod controller;
mod element;
mod session;

pub use controller::PlaybackController;
pub use element::{Generation, MediaElement, MediaEvent, MediaEventSender, TaggedMediaEvent};
pub use session::{spawn_session, PlaybackCommand, PlaybackHandle};
