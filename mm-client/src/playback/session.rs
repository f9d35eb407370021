//! Playback session driver
//!
//! Runs a [`PlaybackController`] on its own task. User commands, element
//! notifications and job snapshots are funnelled through channels and
//! applied one at a time, so the controller never needs a lock.

use std::path::PathBuf;

use mm_common::events::{JobSnapshot, MmEvent, PlaybackSnapshot, TrackSelection};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::controller::PlaybackController;
use super::element::{MediaElement, TaggedMediaEvent};
use crate::error::{Error, Result};

const COMMAND_CAPACITY: usize = 64;

/// User intent forwarded to the session task
#[derive(Debug)]
pub enum PlaybackCommand {
    SelectTrack(TrackSelection),
    TogglePlayPause,
    /// Fraction of the duration (0.0-1.0)
    Seek(f64),
    SetVolume(f64),
    ToggleMute,
    Reset,
    Retry,
    SetOriginal(Option<PathBuf>),
    SetMastered {
        job_id: String,
        output_files: Vec<String>,
    },
    ClearMastered,
    Snapshot(oneshot::Sender<PlaybackSnapshot>),
    Shutdown,
}

/// Cloneable handle to a running playback session
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    tx: mpsc::Sender<PlaybackCommand>,
}

impl PlaybackHandle {
    pub async fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::SessionClosed)
    }

    pub async fn select_track(&self, track: TrackSelection) -> Result<()> {
        self.send(PlaybackCommand::SelectTrack(track)).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.send(PlaybackCommand::TogglePlayPause).await
    }

    pub async fn seek(&self, fraction: f64) -> Result<()> {
        self.send(PlaybackCommand::Seek(fraction)).await
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.send(PlaybackCommand::SetVolume(volume)).await
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        self.send(PlaybackCommand::ToggleMute).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(PlaybackCommand::Reset).await
    }

    pub async fn retry(&self) -> Result<()> {
        self.send(PlaybackCommand::Retry).await
    }

    pub async fn set_original(&self, path: Option<PathBuf>) -> Result<()> {
        self.send(PlaybackCommand::SetOriginal(path)).await
    }

    /// Current controller snapshot, after every command sent before it
    pub async fn snapshot(&self) -> Result<PlaybackSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PlaybackCommand::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Stop the session; the task's join handle yields the controller back
    pub async fn shutdown(&self) -> Result<()> {
        self.send(PlaybackCommand::Shutdown).await
    }
}

/// Spawn the session task
///
/// `job_events` is usually [`JobOrchestrator::subscribe`](crate::JobOrchestrator::subscribe):
/// completed jobs then become playable on the mastered track automatically.
pub fn spawn_session<E>(
    controller: PlaybackController<E>,
    media_events: mpsc::UnboundedReceiver<TaggedMediaEvent>,
    job_events: Option<broadcast::Receiver<MmEvent>>,
) -> (PlaybackHandle, JoinHandle<PlaybackController<E>>)
where
    E: MediaElement + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let task = tokio::spawn(run_session(controller, rx, media_events, job_events));
    (PlaybackHandle { tx }, task)
}

async fn run_session<E: MediaElement>(
    mut controller: PlaybackController<E>,
    mut commands: mpsc::Receiver<PlaybackCommand>,
    mut media_events: mpsc::UnboundedReceiver<TaggedMediaEvent>,
    mut job_events: Option<broadcast::Receiver<MmEvent>>,
) -> PlaybackController<E> {
    info!("Playback session started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(PlaybackCommand::Shutdown) | None => break,
                Some(command) => apply_command(&mut controller, command),
            },
            Some(event) = media_events.recv() => {
                controller.handle_event(event);
            }
            job = next_job_snapshot(&mut job_events) => {
                controller.apply_job_snapshot(&job);
            }
        }
    }

    info!("Playback session stopped");
    controller
}

fn apply_command<E: MediaElement>(controller: &mut PlaybackController<E>, command: PlaybackCommand) {
    debug!(?command, "Playback command");

    match command {
        PlaybackCommand::SelectTrack(track) => controller.select_track(track),
        PlaybackCommand::TogglePlayPause => controller.toggle_play_pause(),
        PlaybackCommand::Seek(fraction) => controller.seek(fraction),
        PlaybackCommand::SetVolume(volume) => controller.set_volume(volume),
        PlaybackCommand::ToggleMute => controller.toggle_mute(),
        PlaybackCommand::Reset => controller.reset(),
        PlaybackCommand::Retry => controller.retry(),
        PlaybackCommand::SetOriginal(path) => controller.set_original(path),
        PlaybackCommand::SetMastered {
            job_id,
            output_files,
        } => controller.set_mastered(job_id, output_files),
        PlaybackCommand::ClearMastered => controller.clear_mastered(),
        PlaybackCommand::Snapshot(reply) => {
            let _ = reply.send(controller.snapshot());
        }
        // Handled by the session loop
        PlaybackCommand::Shutdown => {}
    }
}

/// Next job snapshot from the bus; pending forever once the bus is gone
async fn next_job_snapshot(rx: &mut Option<broadcast::Receiver<MmEvent>>) -> JobSnapshot {
    loop {
        let Some(receiver) = rx.as_mut() else {
            return std::future::pending().await;
        };

        let received = receiver.recv().await;
        match received {
            Ok(MmEvent::JobStateChanged { snapshot, .. }) => return snapshot,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Playback session lagged behind job events");
            }
            Err(RecvError::Closed) => {
                debug!("Job event bus closed");
                *rx = None;
            }
        }
    }
}
