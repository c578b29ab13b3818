//! Time-indexed cue lookup
//!
//! Maps a playback position to the cue (lyric/caption line) that should be
//! highlighted. Every lookup is evaluated from scratch against the sorted cue
//! list, so the result is correct for monotonic tick progress and for
//! discontinuous jumps (seeks) alike; nothing here assumes forward-only
//! movement.

use mezzo_common::types::CueList;

/// Time-indexed lookup over a sorted cue list.
#[derive(Debug, Clone, Default)]
pub struct CueTrack {
    cues: CueList,
}

impl CueTrack {
    pub fn new(cues: CueList) -> Self {
        Self { cues }
    }

    /// Index of the last cue whose `time_ms <= position_ms`.
    ///
    /// Returns `None` when the position precedes the first cue or the list is
    /// empty. That is the documented boundary: no cue is highlighted before
    /// the first one begins.
    pub fn lookup(&self, position_ms: u64) -> Option<usize> {
        let cues = self.cues.cues();
        let idx = cues.partition_point(|c| c.time_ms <= position_ms);
        idx.checked_sub(1)
    }

    /// Start time of the cue at `index`, used to seek when a cue is tapped.
    pub fn cue_time(&self, index: usize) -> Option<u64> {
        self.cues.get(index).map(|c| c.time_ms)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}
