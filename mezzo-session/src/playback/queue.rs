//! Playback queue
//!
//! Ordered track list with a cursor, shuffle/repeat policy, and a history
//! stack. The shuffle bag holds the not-yet-played indices of the current
//! shuffle cycle, guaranteeing no repeat until every track has played once.
//!
//! The queue lives for the whole playback episode; track changes move its
//! cursor but never rebuild it.

use crate::error::{Error, Result};
use mezzo_common::types::{RepeatMode, Track};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Outcome of the track-completion algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Replay the current track from position zero (repeat-one, or a
    /// single-track queue under shuffle)
    RepeatCurrent,
    /// Cursor moved to this index; open the track there with autoplay
    Advance(usize),
    /// Queue exhausted; playback ends
    Ended,
}

/// Outcome of a `previous()` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousOutcome {
    /// Restart the current track from position zero
    Restart,
    /// Cursor moved back to this index
    Moved(usize),
}

/// Ordered track list with cursor, shuffle/repeat policy, and history.
#[derive(Debug)]
pub struct Queue {
    tracks: Vec<Track>,
    current_index: usize,
    shuffle_enabled: bool,
    repeat_mode: RepeatMode,
    /// Unplayed indices of the current shuffle cycle
    shuffle_bag: Vec<usize>,
    /// Previously played indices, most recent last
    history: Vec<usize>,
    rng: StdRng,
}

impl Queue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a queue with an explicit RNG, for deterministic shuffle tests.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: 0,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::Off,
            shuffle_bag: Vec::new(),
            history: Vec::new(),
            rng,
        }
    }

    /// Replace the queue contents. Resets the cursor to `start_index`,
    /// clears history, and reshuffles the bag if shuffle is enabled.
    pub fn set_tracks(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        if !tracks.is_empty() && start_index >= tracks.len() {
            return Err(Error::Queue(format!(
                "start index {} out of range for {} tracks",
                start_index,
                tracks.len()
            )));
        }
        self.tracks = tracks;
        self.current_index = start_index;
        self.history.clear();
        self.refill_bag();
        debug!(
            len = self.tracks.len(),
            start_index, "queue contents replaced"
        );
        Ok(())
    }

    /// Move the cursor to an explicit index (user tapped a row).
    pub fn jump_to(&mut self, index: usize) -> Result<&Track> {
        if index >= self.tracks.len() {
            return Err(Error::Queue(format!(
                "index {} out of range for {} tracks",
                index,
                self.tracks.len()
            )));
        }
        if index != self.current_index {
            self.history.push(self.current_index);
        }
        self.current_index = index;
        self.shuffle_bag.retain(|&i| i != index);
        Ok(&self.tracks[index])
    }

    /// Manual skip to the next track.
    ///
    /// Returns `None` when the queue is exhausted (sequential end with
    /// repeat off, or an empty shuffle bag with repeat off); the cursor is
    /// left where it was.
    pub fn next(&mut self) -> Option<usize> {
        match self.advance_after_finish() {
            AdvanceOutcome::Advance(index) => Some(index),
            // Manual skip on a single-track queue replays that track
            AdvanceOutcome::RepeatCurrent if self.repeat_mode != RepeatMode::One => {
                Some(self.current_index)
            }
            // Repeat-one still moves forward on an explicit skip
            AdvanceOutcome::RepeatCurrent => self.advance_ignoring_repeat_one(),
            AdvanceOutcome::Ended => None,
        }
    }

    /// `previous()` with conventional back-button semantics: restart the
    /// current track when more than the threshold has elapsed, otherwise
    /// move to the prior track (history pop under shuffle, cursor decrement
    /// sequentially, wrapping only under repeat-all).
    pub fn previous(&mut self, elapsed_ms: u64, restart_threshold_ms: u64) -> PreviousOutcome {
        if self.tracks.is_empty() || elapsed_ms > restart_threshold_ms {
            return PreviousOutcome::Restart;
        }

        if self.shuffle_enabled {
            match self.history.pop() {
                Some(index) if index < self.tracks.len() => {
                    self.current_index = index;
                    PreviousOutcome::Moved(index)
                }
                _ => PreviousOutcome::Restart,
            }
        } else if self.current_index > 0 {
            self.current_index -= 1;
            PreviousOutcome::Moved(self.current_index)
        } else if self.repeat_mode == RepeatMode::All && self.tracks.len() > 1 {
            self.current_index = self.tracks.len() - 1;
            PreviousOutcome::Moved(self.current_index)
        } else {
            PreviousOutcome::Restart
        }
    }

    /// Toggle shuffle. Enabling regenerates the bag from every index except
    /// the current one; disabling clears it.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_enabled = !self.shuffle_enabled;
        self.refill_bag();
        debug!(enabled = self.shuffle_enabled, "shuffle toggled");
        self.shuffle_enabled
    }

    /// Cycle repeat mode `Off -> All -> One -> Off`.
    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.cycle();
        debug!(mode = %self.repeat_mode, "repeat mode cycled");
        self.repeat_mode
    }

    /// Track-completion algorithm, run when the engine reports `did_finish`.
    pub fn advance_after_finish(&mut self) -> AdvanceOutcome {
        if self.tracks.is_empty() {
            return AdvanceOutcome::Ended;
        }

        if self.repeat_mode == RepeatMode::One {
            return AdvanceOutcome::RepeatCurrent;
        }

        if self.shuffle_enabled {
            self.advance_shuffled()
        } else {
            self.advance_sequential()
        }
    }

    fn advance_sequential(&mut self) -> AdvanceOutcome {
        let next_index = self.current_index + 1;
        if next_index < self.tracks.len() {
            self.history.push(self.current_index);
            self.current_index = next_index;
            AdvanceOutcome::Advance(next_index)
        } else if self.repeat_mode == RepeatMode::All {
            self.history.push(self.current_index);
            self.current_index = 0;
            AdvanceOutcome::Advance(0)
        } else {
            AdvanceOutcome::Ended
        }
    }

    fn advance_shuffled(&mut self) -> AdvanceOutcome {
        if self.tracks.len() == 1 {
            return AdvanceOutcome::RepeatCurrent;
        }

        // The current index never sits in the bag while it plays, but guard
        // against it anyway so a draw can never repeat the current track.
        let current = self.current_index;
        let candidates: Vec<usize> = self
            .shuffle_bag
            .iter()
            .copied()
            .filter(|&i| i != current && i < self.tracks.len())
            .collect();

        if candidates.is_empty() {
            if self.repeat_mode != RepeatMode::All {
                return AdvanceOutcome::Ended;
            }
            // New shuffle cycle: everything except the track that just played
            self.shuffle_bag = (0..self.tracks.len()).filter(|&i| i != current).collect();
            return self.advance_shuffled();
        }

        let drawn = candidates[self.rng.gen_range(0..candidates.len())];
        self.shuffle_bag.retain(|&i| i != drawn);
        self.history.push(current);
        self.current_index = drawn;

        // Bag emptied by this draw: under repeat-all the next cycle starts
        // now, excluding the track that is about to play
        if self.shuffle_bag.is_empty() && self.repeat_mode == RepeatMode::All {
            self.shuffle_bag = (0..self.tracks.len()).filter(|&i| i != drawn).collect();
        }

        AdvanceOutcome::Advance(drawn)
    }

    /// Sequential/shuffled advance with repeat-one treated as repeat-off,
    /// used for explicit skip commands.
    fn advance_ignoring_repeat_one(&mut self) -> Option<usize> {
        let saved = self.repeat_mode;
        self.repeat_mode = RepeatMode::Off;
        let outcome = self.advance_after_finish();
        self.repeat_mode = saved;
        match outcome {
            AdvanceOutcome::Advance(index) => Some(index),
            AdvanceOutcome::RepeatCurrent => Some(self.current_index),
            AdvanceOutcome::Ended => None,
        }
    }

    fn refill_bag(&mut self) {
        if self.shuffle_enabled && !self.tracks.is_empty() {
            self.shuffle_bag = (0..self.tracks.len())
                .filter(|&i| i != self.current_index)
                .collect();
        } else {
            self.shuffle_bag.clear();
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    pub fn current_index(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            None
        } else {
            Some(self.current_index)
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    #[cfg(test)]
    fn bag(&self) -> &[usize] {
        &self.shuffle_bag
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}
