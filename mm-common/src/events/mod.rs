//! Event types for the MatchMaster notification system
//!
//! Provides the shared event definitions and the EventBus observers subscribe
//! to. Every job transition, successful poll and playback state change is
//! published as an immutable snapshot.

// Sub-modules (supporting types)
mod job_types;
mod playback_types;

pub use job_types::{FailureKind, JobPhase, JobSnapshot};
pub use playback_types::{MediaSource, PlaybackSnapshot, TrackSelection};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// MatchMaster event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so a
/// presentation layer can forward them unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MmEvent {
    /// Job orchestrator state changed
    ///
    /// Emitted on every phase transition and every successful poll.
    JobStateChanged {
        /// Snapshot after the change
        snapshot: JobSnapshot,
        /// When the change happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback controller state changed
    ///
    /// Emitted after user intents and after accepted media element
    /// notifications. Notifications for a superseded source never produce one.
    PlaybackStateChanged {
        /// Snapshot after the change
        snapshot: PlaybackSnapshot,
        /// When the change happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MmEvent {
    /// Wrap a job snapshot, stamped now
    pub fn job(snapshot: JobSnapshot) -> Self {
        MmEvent::JobStateChanged {
            snapshot,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Wrap a playback snapshot, stamped now
    pub fn playback(snapshot: PlaybackSnapshot) -> Self {
        MmEvent::PlaybackStateChanged {
            snapshot,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &str {
        match self {
            MmEvent::JobStateChanged { .. } => "JobStateChanged",
            MmEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mm_common::events::{EventBus, JobSnapshot, MmEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(MmEvent::job(JobSnapshot::idle()));
///
/// let received = rx.try_recv().expect("subscriber sees the event");
/// assert_eq!(received.event_type(), "JobStateChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MmEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped for that subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MmEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MmEvent) -> Result<usize, broadcast::error::SendError<MmEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MmEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
