//! Playback session state machine
//!
//! Owns the current track, position, and playback state; issues engine
//! commands; reconciles asynchronous status ticks; and advances the queue on
//! track completion. All methods are invoked from one serialized task (see
//! `transport`), so no two commands or ticks ever interleave their effects.
//!
//! The generation token is the sole defense against stale-callback
//! corruption: it is bumped on every load and on close, and any status tick
//! or load resolution carrying an older generation is discarded (and its
//! resource unloaded) rather than applied.

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::playback::cue::CueTrack;
use crate::playback::engine::{LoadedMedia, PlaybackEngineAdapter};
use crate::playback::queue::{AdvanceOutcome, PreviousOutcome, Queue};
use mezzo_common::events::SessionEvent;
use mezzo_common::types::{PlaybackState, SessionSnapshot, StatusTick, Track};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

/// Shared handle to the engine behind the adapter boundary
pub type SharedEngine = Arc<Mutex<Box<dyn PlaybackEngineAdapter + Send>>>;

/// Resolution of an in-flight `load`, delivered back to the session task
#[derive(Debug)]
pub struct LoadResolved {
    pub generation: u64,
    pub result: Result<LoadedMedia>,
}

/// The playback session state machine.
pub struct PlaybackSession {
    engine: SharedEngine,
    /// Where spawned load tasks report their resolution
    load_tx: mpsc::UnboundedSender<LoadResolved>,
    events: broadcast::Sender<SessionEvent>,
    config: PlayerConfig,

    queue: Queue,
    state: PlaybackState,
    current_track: Option<Track>,
    cue_track: CueTrack,
    active_cue: Option<usize>,
    position_ms: u64,
    duration_ms: Option<u64>,
    volume: f64,

    /// Bumped on every load and on close; invalidates stale callbacks.
    /// Shared with spawned load tasks, which re-read it under the engine
    /// lock so a superseded task never issues its load at all.
    generation: Arc<AtomicU64>,
    /// A load for the current generation has been spawned but not resolved
    load_in_flight: bool,
    /// Autoplay policy for the load currently in flight
    pending_autoplay: bool,
    /// The engine currently holds an active resource
    has_resource: bool,
    /// State to restore once a seek confirms
    resume_after_seek: Option<PlaybackState>,
    closed: bool,
}

impl PlaybackSession {
    pub fn new(
        engine: SharedEngine,
        load_tx: mpsc::UnboundedSender<LoadResolved>,
        events: broadcast::Sender<SessionEvent>,
        queue: Queue,
        config: PlayerConfig,
    ) -> Self {
        let volume = config.initial_volume.clamp(0.0, 1.0);
        Self {
            engine,
            load_tx,
            events,
            config,
            queue,
            state: PlaybackState::Idle,
            current_track: None,
            cue_track: CueTrack::default(),
            active_cue: None,
            position_ms: 0,
            duration_ms: None,
            volume,
            generation: Arc::new(AtomicU64::new(0)),
            load_in_flight: false,
            pending_autoplay: false,
            has_resource: false,
            resume_after_seek: None,
            closed: false,
        }
    }

    // ---- queue-level commands -------------------------------------------

    /// Replace the queue and open the track at `start_index`.
    pub async fn open_queue(&mut self, tracks: Vec<Track>, start_index: usize) {
        if self.closed {
            return;
        }
        if let Err(e) = self.queue.set_tracks(tracks, start_index) {
            warn!("open_queue rejected: {e}");
            self.emit_error(e.to_string());
            return;
        }
        self.emit_queue_changed();
        let autoplay = self.config.autoplay_on_open;
        self.open_current(autoplay);
    }

    /// Jump to an explicit queue index (user tapped a row).
    pub async fn jump_to(&mut self, index: usize) {
        if self.closed {
            return;
        }
        match self.queue.jump_to(index) {
            Ok(_) => {
                self.emit_queue_changed();
                self.open_current(true);
            }
            Err(e) => debug!("jump_to ignored: {e}"),
        }
    }

    /// Manual skip to the next track. No-op when the queue is exhausted.
    pub async fn next(&mut self) {
        if self.closed {
            return;
        }
        match self.queue.next() {
            Some(_) => {
                self.emit_queue_changed();
                self.open_current(true);
            }
            None => debug!("next ignored: queue exhausted"),
        }
    }

    /// Back-button: restart the current track when past the restart
    /// threshold, otherwise move to the prior track.
    pub async fn previous(&mut self) {
        if self.closed {
            return;
        }
        let threshold = self.config.previous_restart_threshold_ms;
        match self.queue.previous(self.position_ms, threshold) {
            PreviousOutcome::Restart => self.restart_current().await,
            PreviousOutcome::Moved(_) => {
                self.emit_queue_changed();
                self.open_current(true);
            }
        }
    }

    pub fn toggle_shuffle(&mut self) {
        if self.closed {
            return;
        }
        self.queue.toggle_shuffle();
        self.emit_queue_changed();
    }

    pub fn cycle_repeat(&mut self) {
        if self.closed {
            return;
        }
        self.queue.cycle_repeat();
        self.emit_queue_changed();
    }

    // ---- track lifecycle ------------------------------------------------

    /// Open the track under the queue cursor: bump the generation, tear down
    /// any prior resource, and kick off an asynchronous load. Resolution
    /// arrives later as a `LoadResolved` message.
    pub fn open_current(&mut self, autoplay: bool) {
        let track = match self.queue.current_track() {
            Some(track) => track.clone(),
            None => {
                self.set_state(PlaybackState::Idle);
                return;
            }
        };

        if let Some(prior) = &self.current_track {
            self.emit(SessionEvent::TrackCompleted {
                track_id: prior.id,
                completed: false,
                timestamp: chrono::Utc::now(),
            });
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let had_resource = self.has_resource;
        self.has_resource = false;
        self.load_in_flight = true;
        self.resume_after_seek = None;

        self.position_ms = 0;
        self.duration_ms = track.duration_hint_ms;
        self.cue_track = CueTrack::new(track.cues.clone());
        self.active_cue = None;
        self.current_track = Some(track.clone());
        self.set_state(PlaybackState::Loading);

        info!(uri = %track.uri, generation, autoplay, "opening track");
        self.emit(SessionEvent::TrackStarted {
            track_id: track.id,
            queue_index: self.queue.current_index(),
            timestamp: chrono::Utc::now(),
        });

        self.pending_autoplay = autoplay;

        let engine = Arc::clone(&self.engine);
        let live_generation = Arc::clone(&self.generation);
        let load_tx = self.load_tx.clone();
        let uri = track.uri;
        tokio::spawn(async move {
            let mut engine = engine.lock().await;
            // Load tasks acquire the engine lock in no particular order. A
            // task superseded by a newer open (or by close) while it waited
            // must not issue its load, or it would replace the successor's
            // resource with this stale one.
            if live_generation.load(Ordering::SeqCst) != generation {
                debug!(generation, uri = %uri, "skipping superseded load");
                let _ = load_tx.send(LoadResolved {
                    generation,
                    result: Err(Error::Load(format!("superseded before load: {uri}"))),
                });
                return;
            }
            if had_resource {
                // Best-effort: a failed unload must not block the new load
                if let Err(e) = engine.unload().await {
                    warn!("unload before load failed: {e}");
                }
            }
            let result = engine.load(&uri, generation).await;
            drop(engine);
            let _ = load_tx.send(LoadResolved { generation, result });
        });
    }

    /// Apply the resolution of a spawned load.
    ///
    /// A resolution arriving after close releases its resource instead of
    /// activating it; one from a superseded generation is discarded, its
    /// load having been skipped.
    pub async fn handle_load_resolved(&mut self, resolved: LoadResolved) {
        if self.closed {
            // Deferred teardown: the resource this load produced is released
            // here instead of being activated
            debug!(resolved = resolved.generation, "load resolved after close");
            self.load_in_flight = false;
            if resolved.result.is_ok() {
                self.spawn_unload();
            }
            return;
        }
        if resolved.generation != self.generation() {
            // A superseded task either skipped its load entirely or had its
            // resource replaced by the successor's own load
            debug!(
                resolved = resolved.generation,
                current = self.generation(),
                "discarding stale load resolution"
            );
            return;
        }

        self.load_in_flight = false;
        match resolved.result {
            Ok(loaded) => {
                self.has_resource = true;
                if loaded.duration_ms.is_some() {
                    self.duration_ms = loaded.duration_ms;
                }
                // A fresh resource starts at the engine's own default level;
                // bring it to the session's volume before anything plays
                if let Err(e) = self.engine.lock().await.set_volume(self.volume).await {
                    warn!("engine set_volume failed: {e}");
                }
                self.set_state(PlaybackState::Ready);
                if self.pending_autoplay {
                    self.play().await;
                } else {
                    self.set_state(PlaybackState::Paused);
                }
            }
            Err(e) => {
                // Queue cursor deliberately left in place so the user can
                // retry or skip
                warn!("load failed: {e}");
                self.set_state(PlaybackState::Errored);
                self.emit_error(e.to_string());
            }
        }
    }

    /// Idempotent teardown. Returns promptly; the underlying unload may
    /// complete later. No status tick can resurrect a closed session.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Structurally invalidates every outstanding tick, resolution, and
        // not-yet-started load task
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(track) = &self.current_track {
            self.emit(SessionEvent::TrackCompleted {
                track_id: track.id,
                completed: false,
                timestamp: chrono::Utc::now(),
            });
        }
        self.current_track = None;
        self.active_cue = None;
        self.position_ms = 0;
        self.duration_ms = None;
        self.set_state(PlaybackState::Idle);

        if self.load_in_flight {
            // The in-flight load's resolution handler performs the unload;
            // there is no resource to release yet
            debug!("close with load in flight; deferring unload to resolution");
        } else if self.has_resource {
            self.has_resource = false;
            self.spawn_unload();
        }
        info!("session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ---- transport commands ---------------------------------------------

    /// Optimistically enter `Playing` and forward to the engine. No-op in
    /// `Idle`, `Loading`, and `Errored`. Reconciled by the next tick.
    pub async fn play(&mut self) {
        if self.closed || !self.state.accepts_transport_commands() {
            debug!(state = %self.state, "play ignored");
            return;
        }
        if self.state == PlaybackState::Ended {
            // Replay from the top
            self.position_ms = 0;
            self.active_cue = None;
            if let Err(e) = self.engine.lock().await.seek_to(0).await {
                warn!("seek on replay failed: {e}");
            }
        }
        self.set_state(PlaybackState::Playing);
        if let Err(e) = self.engine.lock().await.play().await {
            warn!("engine play failed: {e}");
        }
    }

    /// Optimistically enter `Paused` and forward to the engine. Same no-op
    /// rules as `play`.
    pub async fn pause(&mut self) {
        if self.closed || !self.state.accepts_transport_commands() {
            debug!(state = %self.state, "pause ignored");
            return;
        }
        self.set_state(PlaybackState::Paused);
        if let Err(e) = self.engine.lock().await.pause().await {
            warn!("engine pause failed: {e}");
        }
    }

    /// Seek to a fraction of the duration. No-op while the duration is
    /// unknown.
    pub async fn seek_fraction(&mut self, fraction: f64) {
        let Some(duration) = self.duration_ms else {
            debug!("seek ignored: duration unknown");
            return;
        };
        let fraction = fraction.clamp(0.0, 1.0);
        let target = (duration as f64 * fraction).round() as u64;
        self.seek_ms(target).await;
    }

    /// Seek relative to the current position (the +/-10s and +/-15s
    /// controls).
    pub async fn skip_ms(&mut self, delta_ms: i64) {
        let Some(duration) = self.duration_ms else {
            debug!("skip ignored: duration unknown");
            return;
        };
        let target = (self.position_ms as i64 + delta_ms).clamp(0, duration as i64) as u64;
        self.seek_ms(target).await;
    }

    /// Seek to an absolute position, clamped to `[0, duration]`.
    pub async fn seek_ms(&mut self, target_ms: u64) {
        if self.closed || !self.state.accepts_transport_commands() {
            debug!(state = %self.state, "seek ignored");
            return;
        }
        let Some(duration) = self.duration_ms else {
            debug!("seek ignored: duration unknown");
            return;
        };
        let target = target_ms.min(duration);

        if self.state != PlaybackState::Seeking {
            self.resume_after_seek = Some(self.resume_state());
            self.set_state(PlaybackState::Seeking);
        }
        // Optimistic position: shown immediately, confirmed by the tick
        // that follows seek completion
        self.update_position(target);

        let confirmed = self.engine.lock().await.seek_to(target).await;
        if let Err(e) = confirmed {
            warn!("engine seek failed: {e}");
        }
        let resume = self.resume_after_seek.take().unwrap_or(PlaybackState::Paused);
        self.set_state(resume);
    }

    /// Drag-in-progress position preview: updates the displayed position
    /// without issuing an engine command. The gesture commits through a
    /// normal seek on release.
    pub fn preview_seek_fraction(&mut self, fraction: f64) {
        if self.closed || !self.state.accepts_transport_commands() {
            return;
        }
        let Some(duration) = self.duration_ms else {
            return;
        };
        if self.state != PlaybackState::Seeking {
            self.resume_after_seek = Some(self.resume_state());
            self.set_state(PlaybackState::Seeking);
        }
        let fraction = fraction.clamp(0.0, 1.0);
        self.update_position((duration as f64 * fraction).round() as u64);
    }

    /// Tap on a lyric/caption line: seek to that cue's start time.
    pub async fn select_cue(&mut self, index: usize) {
        match self.cue_track.cue_time(index) {
            Some(time_ms) => self.seek_ms(time_ms).await,
            None => debug!(index, "select_cue ignored: no such cue"),
        }
    }

    /// Set master volume, clamped to [0.0, 1.0].
    pub async fn set_volume(&mut self, volume: f64) {
        if self.closed {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        if self.has_resource {
            if let Err(e) = self.engine.lock().await.set_volume(self.volume).await {
                warn!("engine set_volume failed: {e}");
            }
        }
        self.emit(SessionEvent::VolumeChanged {
            volume: self.volume,
            timestamp: chrono::Utc::now(),
        });
    }

    // ---- status reconciliation ------------------------------------------

    /// Reconcile an asynchronous engine status tick.
    ///
    /// Ticks from a superseded generation are dropped unconditionally; this
    /// is the stale-callback guard, traced at debug and never treated as an
    /// error.
    pub async fn on_status_tick(&mut self, tick: StatusTick) {
        if self.closed || tick.generation != self.generation() {
            debug!(
                tick_generation = tick.generation,
                session_generation = self.generation(),
                closed = self.closed,
                "dropping stale status tick"
            );
            return;
        }

        if tick.duration_ms.is_some() {
            self.duration_ms = tick.duration_ms;
        }

        if self.state == PlaybackState::Seeking && !tick.did_finish {
            // Mid-seek ticks may carry pre-seek positions; the locally held
            // optimistic value stays authoritative until the seek confirms
            return;
        }

        self.update_position(tick.position_ms);

        if tick.did_finish {
            self.handle_finished().await;
            return;
        }

        match self.state {
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Ready => {
                let derived = if tick.is_playing {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
                if derived != self.state {
                    // Buffering stall or late confirmation of play/pause;
                    // the tick is ground truth
                    debug!(from = %self.state, to = %derived, "state reconciled from tick");
                    self.set_state(derived);
                }
            }
            _ => {}
        }

        if let Some(track) = &self.current_track {
            self.emit(SessionEvent::PlaybackProgress {
                track_id: track.id,
                position_ms: self.position_ms,
                duration_ms: self.duration_ms,
                playing: self.state == PlaybackState::Playing,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Track-completion algorithm, driven by the queue's advance outcome.
    async fn handle_finished(&mut self) {
        if let Some(track) = &self.current_track {
            info!(track_id = %track.id, "track finished");
            self.emit(SessionEvent::TrackCompleted {
                track_id: track.id,
                completed: true,
                timestamp: chrono::Utc::now(),
            });
        }

        match self.queue.advance_after_finish() {
            AdvanceOutcome::RepeatCurrent => {
                // Cursor unchanged; replay without reloading
                self.restart_current().await;
            }
            AdvanceOutcome::Advance(_) => {
                // Completion already announced above; drop the track before
                // opening so the replacement is not reported as a skip
                self.current_track = None;
                self.emit_queue_changed();
                self.open_current(true);
            }
            AdvanceOutcome::Ended => {
                if let Some(duration) = self.duration_ms {
                    self.update_position(duration);
                }
                self.set_state(PlaybackState::Ended);
            }
        }
    }

    /// Restart the current track from zero without reloading it.
    async fn restart_current(&mut self) {
        if !self.has_resource {
            return;
        }
        self.update_position(0);
        {
            let mut engine = self.engine.lock().await;
            if let Err(e) = engine.seek_to(0).await {
                warn!("restart seek failed: {e}");
            }
            if let Err(e) = engine.play().await {
                warn!("restart play failed: {e}");
            }
        }
        self.set_state(PlaybackState::Playing);
    }

    // ---- observation -----------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            track_id: self.current_track.as_ref().map(|t| t.id),
            track: self.current_track.as_ref().map(|t| t.metadata.clone()),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            volume: self.volume,
            active_cue_index: self.active_cue,
            queue_index: self.queue.current_index(),
            queue_len: self.queue.len(),
            shuffle_enabled: self.queue.shuffle_enabled(),
            repeat_mode: self.queue.repeat_mode(),
            generation: self.generation(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // ---- internals -------------------------------------------------------

    /// Position write-through: clamps to the known duration and re-resolves
    /// the active cue from scratch (correct across seeks in both directions).
    fn update_position(&mut self, position_ms: u64) {
        self.position_ms = match self.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        };

        let cue = self.cue_track.lookup(self.position_ms);
        if cue != self.active_cue {
            self.active_cue = cue;
            if let Some(track) = &self.current_track {
                self.emit(SessionEvent::ActiveCueChanged {
                    track_id: track.id,
                    cue_index: cue,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    fn resume_state(&self) -> PlaybackState {
        match self.state {
            PlaybackState::Playing => PlaybackState::Playing,
            _ => PlaybackState::Paused,
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
        self.emit(SessionEvent::StateChanged {
            state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn spawn_unload(&self) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            // Unload failures never block navigation or the next open
            if let Err(e) = engine.lock().await.unload().await {
                warn!("engine unload failed: {e}");
            }
        });
    }

    fn emit_queue_changed(&self) {
        self.emit(SessionEvent::QueueChanged {
            queue_index: self.queue.current_index(),
            queue_len: self.queue.len(),
            shuffle_enabled: self.queue.shuffle_enabled(),
            repeat_mode: self.queue.repeat_mode(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_error(&self, message: String) {
        self.emit(SessionEvent::PlaybackError {
            message,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use mezzo_common::types::{Cue, CueList};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Scripted engine that records every command and never ticks on its own
    struct StubEngine {
        log: Arc<StdMutex<Vec<String>>>,
        fail_loads: bool,
        duration_ms: u64,
    }

    #[async_trait]
    impl PlaybackEngineAdapter for StubEngine {
        async fn load(&mut self, uri: &str, generation: u64) -> Result<LoadedMedia> {
            self.log.lock().unwrap().push(format!("load {uri} gen={generation}"));
            if self.fail_loads {
                Err(Error::Load(format!("cannot open media: {uri}")))
            } else {
                Ok(LoadedMedia {
                    duration_ms: Some(self.duration_ms),
                })
            }
        }

        async fn play(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("play".into());
            Ok(())
        }

        async fn pause(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("pause".into());
            Ok(())
        }

        async fn seek_to(&mut self, position_ms: u64) -> Result<()> {
            self.log.lock().unwrap().push(format!("seek {position_ms}"));
            Ok(())
        }

        async fn set_volume(&mut self, volume: f64) -> Result<()> {
            self.log.lock().unwrap().push(format!("volume {volume}"));
            Ok(())
        }

        async fn unload(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("unload".into());
            Ok(())
        }
    }

    struct Harness {
        session: PlaybackSession,
        loads: mpsc::UnboundedReceiver<LoadResolved>,
        log: Arc<StdMutex<Vec<String>>>,
    }

    fn harness(fail_loads: bool, duration_ms: u64) -> Harness {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let engine: SharedEngine = Arc::new(Mutex::new(Box::new(StubEngine {
            log: Arc::clone(&log),
            fail_loads,
            duration_ms,
        })));
        let (load_tx, loads) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(64);
        let session = PlaybackSession::new(
            engine,
            load_tx,
            event_tx,
            Queue::with_rng(StdRng::seed_from_u64(11)),
            PlayerConfig::default(),
        );
        Harness {
            session,
            loads,
            log,
        }
    }

    fn tracks(n: usize) -> Vec<Track> {
        (0..n).map(|i| Track::new(format!("file:///{i}.mp3"))).collect()
    }

    fn tick(generation: u64, position_ms: u64, is_playing: bool, did_finish: bool) -> StatusTick {
        StatusTick {
            generation,
            position_ms,
            duration_ms: Some(45_000),
            is_playing,
            did_finish,
        }
    }

    /// Open a queue and drive the load through to Playing
    async fn open_and_resolve(h: &mut Harness, tracks: Vec<Track>, start_index: usize) {
        h.session.open_queue(tracks, start_index).await;
        let resolved = h.loads.recv().await.expect("load spawned");
        h.session.handle_load_resolved(resolved).await;
    }

    #[tokio::test]
    async fn open_resolves_to_playing_with_autoplay() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(3), 0).await;

        assert_eq!(h.session.state(), PlaybackState::Playing);
        assert_eq!(h.session.duration_ms(), Some(45_000));
        let log = h.log.lock().unwrap();
        assert!(log.iter().any(|l| l.starts_with("load file:///0.mp3")));
        assert!(log.contains(&"play".to_string()));
    }

    #[tokio::test]
    async fn load_failure_leaves_queue_cursor_in_place() {
        let mut h = harness(true, 45_000);
        open_and_resolve(&mut h, tracks(3), 1).await;

        assert_eq!(h.session.state(), PlaybackState::Errored);
        assert_eq!(h.session.snapshot().queue_index, Some(1));
    }

    #[tokio::test]
    async fn stale_generation_tick_changes_nothing() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;
        let generation = h.session.generation();

        h.session.on_status_tick(tick(generation, 5_000, true, false)).await;
        assert_eq!(h.session.position_ms(), 5_000);

        // Tick from a superseded load: dropped entirely
        h.session.on_status_tick(tick(generation - 1, 99_000, false, true)).await;
        assert_eq!(h.session.position_ms(), 5_000);
        assert_eq!(h.session.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn play_and_pause_are_noops_while_loading() {
        let mut h = harness(false, 45_000);
        h.session.open_queue(tracks(1), 0).await;
        assert_eq!(h.session.state(), PlaybackState::Loading);

        h.session.play().await;
        h.session.pause().await;
        assert_eq!(h.session.state(), PlaybackState::Loading);
        let log = h.log.lock().unwrap();
        assert!(!log.contains(&"play".to_string()));
        assert!(!log.contains(&"pause".to_string()));
    }

    #[tokio::test]
    async fn seek_fraction_clamps_into_duration() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;

        h.session.seek_fraction(0.5).await;
        assert_eq!(h.session.position_ms(), 22_500);
        assert_eq!(h.session.state(), PlaybackState::Playing);

        h.session.seek_fraction(7.0).await;
        assert_eq!(h.session.position_ms(), 45_000);

        h.session.skip_ms(-100_000).await;
        assert_eq!(h.session.position_ms(), 0);
    }

    #[tokio::test]
    async fn seek_restores_paused_state() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;
        h.session.pause().await;

        h.session.seek_fraction(0.25).await;
        assert_eq!(h.session.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn seek_is_noop_while_duration_unknown() {
        let mut h = harness(false, 45_000);
        h.session
            .open_queue(vec![Track::new("file:///no-hint.mp3")], 0)
            .await;
        // Still loading, duration unknown
        h.session.seek_fraction(0.5).await;
        assert_eq!(h.session.position_ms(), 0);
        assert!(!h.log.lock().unwrap().iter().any(|l| l.starts_with("seek")));
    }

    #[tokio::test]
    async fn finish_with_repeat_one_replays_in_place() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(3), 0).await;
        h.session.cycle_repeat(); // All
        h.session.cycle_repeat(); // One

        let generation = h.session.generation();
        h.session.on_status_tick(tick(generation, 45_000, false, true)).await;

        assert_eq!(h.session.state(), PlaybackState::Playing);
        assert_eq!(h.session.position_ms(), 0);
        assert_eq!(h.session.snapshot().queue_index, Some(0));
        // Replayed, not reloaded
        assert_eq!(h.session.generation(), generation);
    }

    #[tokio::test]
    async fn finish_at_queue_end_transitions_to_ended() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;

        let generation = h.session.generation();
        h.session.on_status_tick(tick(generation, 45_000, false, true)).await;
        assert_eq!(h.session.state(), PlaybackState::Ended);
        assert_eq!(h.session.position_ms(), 45_000);
    }

    #[tokio::test]
    async fn finish_advances_and_reloads_next_track() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(3), 0).await;
        let first_generation = h.session.generation();

        h.session
            .on_status_tick(tick(first_generation, 45_000, false, true))
            .await;
        assert_eq!(h.session.state(), PlaybackState::Loading);
        assert_eq!(h.session.snapshot().queue_index, Some(1));
        assert_eq!(h.session.generation(), first_generation + 1);

        let resolved = h.loads.recv().await.unwrap();
        h.session.handle_load_resolved(resolved).await;
        assert_eq!(h.session.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn superseding_open_skips_the_older_load_entirely() {
        let mut h = harness(false, 45_000);
        h.session.open_queue(tracks(3), 0).await;
        h.session.jump_to(2).await;

        // Both spawned tasks resolve in whatever order the runtime ran them
        let first = h.loads.recv().await.unwrap();
        h.session.handle_load_resolved(first).await;
        let second = h.loads.recv().await.unwrap();
        h.session.handle_load_resolved(second).await;

        assert_eq!(h.session.state(), PlaybackState::Playing);
        assert_eq!(h.session.snapshot().queue_index, Some(2));

        // Only the surviving generation touched the engine; the superseded
        // task never issued its load
        let log = h.log.lock().unwrap();
        let loads: Vec<_> = log.iter().filter(|l| l.starts_with("load ")).collect();
        assert_eq!(loads.len(), 1);
        assert!(loads[0].starts_with("load file:///2.mp3"));
    }

    #[tokio::test]
    async fn stall_ticks_reconcile_state_and_recovery_restores_it() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;
        let generation = h.session.generation();

        h.session.on_status_tick(tick(generation, 5_000, true, false)).await;
        assert_eq!(h.session.state(), PlaybackState::Playing);

        // Buffering stall: the engine stops without a pause command; the
        // tick is ground truth
        h.session.on_status_tick(tick(generation, 5_000, false, false)).await;
        assert_eq!(h.session.state(), PlaybackState::Paused);

        // Recovery flips it back without any command either
        h.session.on_status_tick(tick(generation, 5_400, true, false)).await;
        assert_eq!(h.session.state(), PlaybackState::Playing);
        assert_eq!(h.session.position_ms(), 5_400);
    }

    #[tokio::test]
    async fn activation_pushes_session_volume_to_engine() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;

        // Default session volume reaches the engine before play
        let log = h.log.lock().unwrap();
        let volume_at = log.iter().position(|l| l == "volume 0.75");
        let play_at = log.iter().position(|l| l == "play");
        assert!(volume_at.is_some());
        assert!(volume_at < play_at);
    }

    #[tokio::test]
    async fn close_during_inflight_load_unloads_on_resolution() {
        let mut h = harness(false, 45_000);
        h.session.open_queue(tracks(1), 0).await;
        let loading_generation = h.session.generation();

        // The load completes, but close lands before its resolution is
        // processed
        let resolved = h.loads.recv().await.unwrap();
        h.session.close();
        assert_eq!(h.session.state(), PlaybackState::Idle);
        h.session.handle_load_resolved(resolved).await;

        // The late-resolving load is released, never activated
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.log.lock().unwrap().contains(&"unload".to_string()));

        // No tick of any generation resurrects the closed session
        h.session
            .on_status_tick(tick(loading_generation, 10_000, true, false))
            .await;
        assert_eq!(h.session.state(), PlaybackState::Idle);
        assert_eq!(h.session.position_ms(), 0);
    }

    #[tokio::test]
    async fn close_before_load_task_runs_skips_the_load() {
        let mut h = harness(false, 45_000);
        h.session.open_queue(tracks(1), 0).await;
        h.session.close();

        // The spawned task first runs here and sees the bumped generation
        let resolved = h.loads.recv().await.unwrap();
        h.session.handle_load_resolved(resolved).await;

        // No resource was ever acquired, so nothing to release
        tokio::time::sleep(Duration::from_millis(50)).await;
        let log = h.log.lock().unwrap();
        assert!(!log.iter().any(|l| l.starts_with("load ")));
        assert!(!log.contains(&"unload".to_string()));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;
        h.session.close();
        h.session.close();
        assert!(h.session.is_closed());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let unloads = h
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.as_str() == "unload")
            .count();
        assert_eq!(unloads, 1);
    }

    #[tokio::test]
    async fn previous_restarts_late_and_moves_back_early() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(3), 0).await;
        h.session.next().await;
        let resolved = h.loads.recv().await.unwrap();
        h.session.handle_load_resolved(resolved).await;
        assert_eq!(h.session.snapshot().queue_index, Some(1));

        // 10s in: restart the same track
        let generation = h.session.generation();
        h.session.on_status_tick(tick(generation, 10_000, true, false)).await;
        h.session.previous().await;
        assert_eq!(h.session.snapshot().queue_index, Some(1));
        assert_eq!(h.session.position_ms(), 0);
        assert_eq!(h.session.generation(), generation);

        // 2s in: move to the prior track (new load)
        h.session.on_status_tick(tick(generation, 2_000, true, false)).await;
        h.session.previous().await;
        assert_eq!(h.session.snapshot().queue_index, Some(0));
        assert_eq!(h.session.state(), PlaybackState::Loading);
    }

    #[tokio::test]
    async fn ticks_drive_active_cue_in_both_directions() {
        let mut h = harness(false, 45_000);
        let track = Track::new("file:///lyrics.mp3").with_cues(CueList::new(vec![
            Cue::new(0, "a"),
            Cue::new(10_000, "b"),
            Cue::new(20_000, "c"),
        ]));
        open_and_resolve(&mut h, vec![track], 0).await;

        let generation = h.session.generation();
        h.session.on_status_tick(tick(generation, 15_000, true, false)).await;
        assert_eq!(h.session.snapshot().active_cue_index, Some(1));

        // Backward seek re-resolves the cue, no forward-only assumption
        h.session.seek_fraction(0.0).await;
        assert_eq!(h.session.snapshot().active_cue_index, Some(0));
    }

    #[tokio::test]
    async fn select_cue_seeks_to_cue_time() {
        let mut h = harness(false, 45_000);
        let track = Track::new("file:///lyrics.mp3").with_cues(CueList::new(vec![
            Cue::new(0, "a"),
            Cue::new(10_000, "b"),
        ]));
        open_and_resolve(&mut h, vec![track], 0).await;

        h.session.select_cue(1).await;
        assert_eq!(h.session.position_ms(), 10_000);
        assert!(h.log.lock().unwrap().contains(&"seek 10000".to_string()));

        // Out-of-range cue index is a no-op
        h.session.select_cue(9).await;
        assert_eq!(h.session.position_ms(), 10_000);
    }

    #[tokio::test]
    async fn volume_is_clamped_and_forwarded() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;

        h.session.set_volume(1.7).await;
        assert_eq!(h.session.snapshot().volume, 1.0);
        assert!(h.log.lock().unwrap().contains(&"volume 1".to_string()));
    }

    #[tokio::test]
    async fn preview_seek_holds_local_position_against_ticks() {
        let mut h = harness(false, 45_000);
        open_and_resolve(&mut h, tracks(1), 0).await;
        let generation = h.session.generation();
        h.session.on_status_tick(tick(generation, 5_000, true, false)).await;

        h.session.preview_seek_fraction(0.8);
        assert_eq!(h.session.state(), PlaybackState::Seeking);
        assert_eq!(h.session.position_ms(), 36_000);

        // An engine tick with the pre-drag position must not clobber the
        // locally held value
        h.session.on_status_tick(tick(generation, 5_250, true, false)).await;
        assert_eq!(h.session.position_ms(), 36_000);

        // Release commits through a normal seek and restores Playing
        h.session.seek_fraction(0.8).await;
        assert_eq!(h.session.state(), PlaybackState::Playing);
        assert_eq!(h.session.position_ms(), 36_000);
    }
}
