//! Event types for the mezzo session event stream
//!
//! Events are broadcast by the session task and consumed by UI bindings.
//! Send errors (no receivers) are ignored by the broadcaster.

use crate::types::{PlaybackState, RepeatMode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Playback state changed
    StateChanged {
        state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track began loading and will play (or pause) once ready
    TrackStarted {
        track_id: Uuid,
        queue_index: Option<usize>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track finished or was replaced
    ///
    /// `completed` is true only when the engine reported natural end of
    /// media, false when the track was skipped or the session closed.
    TrackCompleted {
        track_id: Uuid,
        completed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback position update
    PlaybackProgress {
        track_id: Uuid,
        position_ms: u64,
        duration_ms: Option<u64>,
        playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue ordering, cursor, or policy changed
    QueueChanged {
        queue_index: Option<usize>,
        queue_len: usize,
        shuffle_enabled: bool,
        repeat_mode: RepeatMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed
    VolumeChanged {
        volume: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The highlighted cue/lyric line changed
    ActiveCueChanged {
        track_id: Uuid,
        cue_index: Option<usize>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A load or engine failure surfaced to the user
    PlaybackError {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SessionEvent {
    /// Event type name as it appears on the wire (`type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "StateChanged",
            SessionEvent::TrackStarted { .. } => "TrackStarted",
            SessionEvent::TrackCompleted { .. } => "TrackCompleted",
            SessionEvent::PlaybackProgress { .. } => "PlaybackProgress",
            SessionEvent::QueueChanged { .. } => "QueueChanged",
            SessionEvent::VolumeChanged { .. } => "VolumeChanged",
            SessionEvent::ActiveCueChanged { .. } => "ActiveCueChanged",
            SessionEvent::PlaybackError { .. } => "PlaybackError",
        }
    }
}
