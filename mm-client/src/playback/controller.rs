//! Dual-track playback controller
//!
//! Holds the state of one playback session and is its single mutation entry
//! point. The media element is the source of truth for position, duration,
//! play state and load state: those fields only change when an element
//! notification for the current generation arrives. `seek()` and `reset()`
//! are the exceptions and write the position immediately.

use std::path::PathBuf;

use mm_common::events::{
    EventBus, JobPhase, JobSnapshot, MmEvent, PlaybackSnapshot, TrackSelection,
};
use mm_common::human_time::format_playback_time;
use tracing::{debug, info, warn};

use super::element::{MediaElement, MediaEvent, TaggedMediaEvent};
use crate::resolver::{MasteredOutputs, MediaSourceResolver, SourceInputs};

const DEFAULT_VOLUME: f64 = 1.0;

/// Playback state machine bound to one media element
pub struct PlaybackController<E: MediaElement> {
    element: E,
    resolver: MediaSourceResolver,
    inputs: SourceInputs,
    events: EventBus,
    state: PlaybackSnapshot,
    /// Level restored when unmuting from zero volume
    last_audible: f64,
}

impl<E: MediaElement> PlaybackController<E> {
    pub fn new(mut element: E, resolver: MediaSourceResolver, events: EventBus) -> Self {
        element.set_volume(DEFAULT_VOLUME);

        Self {
            element,
            resolver,
            inputs: SourceInputs::default(),
            events,
            state: PlaybackSnapshot {
                generation: 0,
                selected_track: TrackSelection::Original,
                source: None,
                is_playing: false,
                is_muted: false,
                volume: DEFAULT_VOLUME,
                audible_volume: DEFAULT_VOLUME,
                current_time: 0.0,
                duration: None,
                loading: false,
                error: None,
            },
            last_audible: DEFAULT_VOLUME,
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.clone()
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut E {
        &mut self.element
    }

    /// Switch between the original and mastered track
    ///
    /// Selecting the already-selected track does nothing.
    pub fn select_track(&mut self, track: TrackSelection) {
        if self.state.selected_track == track {
            return;
        }

        self.state.selected_track = track;
        self.rebind();
    }

    /// Reload the current selection, clearing any playback error
    pub fn retry(&mut self) {
        info!(track = %self.state.selected_track, "Retrying playback source");
        self.rebind();
    }

    /// Pause if playing, otherwise ask the element to play
    ///
    /// Ignored while loading, after an error, or with no source bound. The
    /// play state itself changes only when the element reports back.
    pub fn toggle_play_pause(&mut self) {
        if !self.state.controls_enabled() {
            debug!(
                loading = self.state.loading,
                error = self.state.error.is_some(),
                "Ignoring play/pause while controls are disabled"
            );
            return;
        }

        if self.state.is_playing {
            self.element.pause();
        } else {
            self.element.play();
        }
    }

    /// Jump to `fraction` (0.0-1.0) of the duration
    pub fn seek(&mut self, fraction: f64) {
        let duration = match self.state.duration {
            Some(d) if d.is_finite() && d > 0.0 => d,
            _ => return,
        };
        if !fraction.is_finite() || self.state.source.is_none() {
            return;
        }

        let position = fraction.clamp(0.0, 1.0) * duration;
        self.element.seek(position);
        self.state.current_time = position;
        self.publish();
    }

    /// Back to the start without changing the play state
    pub fn reset(&mut self) {
        if self.state.source.is_none() {
            return;
        }

        self.element.seek(0.0);
        self.state.current_time = 0.0;
        self.publish();
    }

    /// Set the stored volume; zero mutes, anything above unmutes
    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            return;
        }

        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        self.state.is_muted = volume == 0.0;
        if volume > 0.0 {
            self.last_audible = volume;
        }
        self.apply_volume();
        self.publish();
    }

    /// Silence output without touching the stored volume, or restore it
    pub fn toggle_mute(&mut self) {
        if self.state.is_muted {
            self.state.is_muted = false;
            if self.state.volume == 0.0 {
                self.state.volume = self.last_audible;
            }
        } else {
            self.state.is_muted = true;
        }
        self.apply_volume();
        self.publish();
    }

    /// Local file played for the original track
    pub fn set_original(&mut self, path: Option<PathBuf>) {
        if self.inputs.original == path {
            return;
        }

        self.inputs.original = path;
        if self.state.selected_track == TrackSelection::Original {
            self.rebind();
        }
    }

    /// Outputs of a completed job, played for the mastered track
    pub fn set_mastered(&mut self, job_id: String, output_files: Vec<String>) {
        self.update_mastered(Some(MasteredOutputs {
            job_id,
            output_files,
        }));
    }

    /// Forget the mastered outputs (a new job started, or the job failed)
    pub fn clear_mastered(&mut self) {
        self.update_mastered(None);
    }

    /// Follow the job orchestrator: outputs become playable only once the
    /// job completed
    pub fn apply_job_snapshot(&mut self, job: &JobSnapshot) {
        let mastered = match (job.phase, &job.job_id) {
            (JobPhase::Completed, Some(job_id)) => Some(MasteredOutputs {
                job_id: job_id.clone(),
                output_files: job.output_files.clone(),
            }),
            _ => None,
        };
        self.update_mastered(mastered);
    }

    fn update_mastered(&mut self, mastered: Option<MasteredOutputs>) {
        if self.inputs.mastered == mastered {
            return;
        }

        self.inputs.mastered = mastered;
        if self.state.selected_track == TrackSelection::Mastered {
            self.rebind();
        }
    }

    /// Apply an element notification
    ///
    /// Returns false when the notification belongs to a replaced source and
    /// was discarded.
    pub fn handle_event(&mut self, tagged: TaggedMediaEvent) -> bool {
        if tagged.generation != self.state.generation {
            debug!(
                event_generation = tagged.generation,
                current_generation = self.state.generation,
                "Discarding media event for replaced source"
            );
            return false;
        }

        let state = &mut self.state;
        match tagged.event {
            MediaEvent::LoadStarted => {
                state.loading = true;
                state.error = None;
            }
            MediaEvent::MetadataLoaded { duration } => {
                state.duration = (duration >= 0.0).then_some(duration);
                clamp_position(state);
            }
            MediaEvent::CanPlay => state.loading = false,
            MediaEvent::TimeUpdate { current_time } => {
                state.current_time = if current_time.is_finite() {
                    current_time.max(0.0)
                } else {
                    0.0
                };
                clamp_position(state);
            }
            MediaEvent::Ended => {
                debug!(at = %format_playback_time(Some(state.current_time)), "Playback ended");
                state.is_playing = false;
            }
            MediaEvent::Error { reason } => {
                warn!(source = ?state.source, %reason, "Failed to load audio");
                state.error = Some(reason);
                state.loading = false;
                state.is_playing = false;
            }
            MediaEvent::PlayStarted => {
                if state.error.is_some() {
                    return false;
                }
                state.is_playing = true;
            }
            MediaEvent::PlayRejected { reason } => {
                warn!(%reason, "Playback failed");
                state.error = Some(format!("Playback failed: {}", reason));
                state.loading = false;
                state.is_playing = false;
            }
            MediaEvent::Paused => state.is_playing = false,
        }

        self.publish();
        true
    }

    /// Bind the source of the current selection under a fresh generation
    fn rebind(&mut self) {
        let state = &mut self.state;
        state.generation += 1;
        state.error = None;
        state.current_time = 0.0;
        state.duration = None;
        state.is_playing = false;
        state.source = self.resolver.resolve(state.selected_track, &self.inputs);

        match &state.source {
            Some(source) => {
                state.loading = true;
                debug!(
                    generation = state.generation,
                    track = %state.selected_track,
                    source = %source,
                    "Binding media source"
                );
                self.element.load(source, state.generation);
            }
            None => {
                state.loading = false;
                debug!(track = %state.selected_track, "Track not available");
                self.element.unload();
            }
        }

        self.apply_volume();
        self.publish();
    }

    fn apply_volume(&mut self) {
        self.state.audible_volume = if self.state.is_muted {
            0.0
        } else {
            self.state.volume
        };
        self.element.set_volume(self.state.audible_volume);
    }

    fn publish(&self) {
        self.events.emit_lossy(MmEvent::playback(self.state.clone()));
    }
}

fn clamp_position(state: &mut PlaybackSnapshot) {
    if let Some(duration) = state.duration.filter(|d| d.is_finite()) {
        state.current_time = state.current_time.min(duration);
    }
}
