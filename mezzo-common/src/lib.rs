//! # Mezzo Common Library
//!
//! Shared vocabulary for the mezzo playback core:
//! - Core data types (tracks, cues, playback state, status ticks)
//! - Event types (SessionEvent enum)
//! - Human-readable time formatting for UI binding

pub mod events;
pub mod time;
pub mod types;

pub use events::SessionEvent;
pub use types::{
    Cue, CueList, PlaybackState, RepeatMode, SessionSnapshot, StatusTick, Track, TrackMetadata,
};
