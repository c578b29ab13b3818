//! Core playback types shared across the workspace

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single timestamped caption/lyric line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    /// Offset from track start in milliseconds
    pub time_ms: u64,
    /// Display text for this cue
    pub text: String,
}

impl Cue {
    pub fn new(time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            time_ms,
            text: text.into(),
        }
    }
}

/// Ordered cue sequence with non-decreasing `time_ms`.
///
/// Construction sorts defensively (stable sort, so equal timestamps keep
/// their original relative order). May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueList {
    cues: Vec<Cue>,
}

impl CueList {
    pub fn new(mut cues: Vec<Cue>) -> Self {
        cues.sort_by_key(|c| c.time_ms);
        Self { cues }
    }

    pub fn empty() -> Self {
        Self { cues: Vec::new() }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }
}

impl From<Vec<Cue>> for CueList {
    fn from(cues: Vec<Cue>) -> Self {
        Self::new(cues)
    }
}

/// Display metadata attached to a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork_uri: Option<String>,
}

/// A playable item: resolved URI plus cues and display metadata.
///
/// URI resolution (library scanning, permission prompts) happens outside the
/// playback core; a `Track` always carries an already-resolved URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub uri: String,
    /// Duration reported by the media library, if known. The engine-reported
    /// duration always wins once a load resolves.
    pub duration_hint_ms: Option<u64>,
    pub cues: CueList,
    pub metadata: TrackMetadata,
}

impl Track {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
            duration_hint_ms: None,
            cues: CueList::empty(),
            metadata: TrackMetadata::default(),
        }
    }

    pub fn with_duration_hint(mut self, duration_ms: u64) -> Self {
        self.duration_hint_ms = Some(duration_ms);
        self
    }

    pub fn with_cues(mut self, cues: impl Into<CueList>) -> Self {
        self.cues = cues.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }
}

/// Playback session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Seeking,
    Ended,
    Errored,
}

impl PlaybackState {
    /// States in which transport commands (play/pause/seek) are accepted.
    /// Commands in other states are defined as no-ops, never faults.
    pub fn accepts_transport_commands(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Seeking
                | PlaybackState::Ended
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Seeking => write!(f, "seeking"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Errored => write!(f, "errored"),
        }
    }
}

/// Repeat policy for queue advancement.
///
/// `cycle()` advances `Off -> All -> One -> Off`. Source players disagreed on
/// the cycle order; this is the canonical one for the whole codebase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatMode::Off => write!(f, "off"),
            RepeatMode::All => write!(f, "all"),
            RepeatMode::One => write!(f, "one"),
        }
    }
}

/// Asynchronous position/duration report from the media engine.
///
/// Delivered at an engine-determined cadence (typically hundreds of
/// milliseconds). `generation` is stamped by the engine from the value passed
/// to `load`; a tick whose generation does not match the session's current
/// generation is discarded unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTick {
    pub generation: u64,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub is_playing: bool,
    pub did_finish: bool,
}

/// Point-in-time view of a session, published for UI binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub track_id: Option<Uuid>,
    pub track: Option<TrackMetadata>,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: f64,
    /// Index into the current track's cue list, `None` when the position
    /// precedes the first cue or the track has no cues.
    pub active_cue_index: Option<usize>,
    pub queue_index: Option<usize>,
    pub queue_len: usize,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub generation: u64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            track_id: None,
            track: None,
            position_ms: 0,
            duration_ms: None,
            volume: 0.75,
            active_cue_index: None,
            queue_index: None,
            queue_len: 0,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::Off,
            generation: 0,
        }
    }
}
