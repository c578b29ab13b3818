//! Transport facade
//!
//! The single serialized entry point UI controls talk to. Every command is a
//! fire-and-forget message onto one channel; a dedicated task owns the
//! `PlaybackSession` and processes commands, engine status ticks, and load
//! resolutions strictly one at a time. UI observes the session through a
//! `watch` snapshot channel and a `broadcast` event stream.

use crate::config::PlayerConfig;
use crate::playback::engine::{PlaybackEngineAdapter, TickReceiver};
use crate::playback::queue::Queue;
use crate::playback::session::{LoadResolved, PlaybackSession};
use futures::{Stream, StreamExt};
use mezzo_common::events::SessionEvent;
use mezzo_common::types::{SessionSnapshot, Track};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Commands accepted by the session task
#[derive(Debug)]
pub enum Command {
    /// Replace the queue and open the track at `start_index`
    OpenQueue {
        tracks: Vec<Track>,
        start_index: usize,
    },
    /// Jump to an explicit queue index
    JumpTo(usize),
    Play,
    Pause,
    /// Seek to a fraction of the duration, `[0, 1]`
    Seek(f64),
    /// Drag-in-progress preview; display-only, committed by `Seek`
    PreviewSeek(f64),
    /// Seek relative to the current position
    Skip(i64),
    Next,
    Previous,
    ToggleShuffle,
    CycleRepeat,
    SetVolume(f64),
    /// Seek to the start time of the cue at this index
    SelectCue(usize),
    Close,
}

/// Handle to a running playback session.
///
/// Cheap to clone pieces are exposed through `subscribe`/`subscribe_events`;
/// the handle itself owns the session task and shuts it down via `close` or
/// `shutdown`.
pub struct TransportFacade {
    commands: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl TransportFacade {
    /// Spawn the session task around an engine adapter.
    ///
    /// `ticks` is the receiving half of the channel the engine pushes its
    /// status ticks into (see `engine::tick_channel`).
    pub fn spawn(
        engine: Box<dyn PlaybackEngineAdapter + Send>,
        ticks: TickReceiver,
        config: PlayerConfig,
    ) -> Self {
        Self::spawn_with_queue(engine, ticks, config, Queue::new())
    }

    /// Spawn with a pre-built queue (deterministic RNG in tests).
    pub fn spawn_with_queue(
        engine: Box<dyn PlaybackEngineAdapter + Send>,
        ticks: TickReceiver,
        config: PlayerConfig,
        queue: Queue,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let engine: Arc<Mutex<Box<dyn PlaybackEngineAdapter + Send>>> =
            Arc::new(Mutex::new(engine));
        let session = PlaybackSession::new(
            engine,
            load_tx,
            event_tx.clone(),
            queue,
            config,
        );
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        let task = tokio::spawn(session_loop(
            session,
            command_rx,
            ticks,
            load_rx,
            snapshot_tx,
        ));

        Self {
            commands: command_tx,
            snapshot_rx,
            events: event_tx,
            task: Some(task),
        }
    }

    // ---- command surface -------------------------------------------------

    pub fn open_queue(&self, tracks: Vec<Track>, start_index: usize) {
        self.send(Command::OpenQueue {
            tracks,
            start_index,
        });
    }

    pub fn jump_to(&self, index: usize) {
        self.send(Command::JumpTo(index));
    }

    pub fn play(&self) {
        self.send(Command::Play);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    /// Seek to a fraction of the duration, `fraction` clamped to [0, 1].
    pub fn seek(&self, fraction: f64) {
        self.send(Command::Seek(fraction));
    }

    /// Update the displayed position during a drag without committing it.
    pub fn preview_seek(&self, fraction: f64) {
        self.send(Command::PreviewSeek(fraction));
    }

    /// Relative seek, e.g. `skip(15_000)` or `skip(-10_000)`.
    pub fn skip(&self, delta_ms: i64) {
        self.send(Command::Skip(delta_ms));
    }

    pub fn next(&self) {
        self.send(Command::Next);
    }

    pub fn previous(&self) {
        self.send(Command::Previous);
    }

    pub fn toggle_shuffle(&self) {
        self.send(Command::ToggleShuffle);
    }

    pub fn cycle_repeat(&self) {
        self.send(Command::CycleRepeat);
    }

    pub fn set_volume(&self, volume: f64) {
        self.send(Command::SetVolume(volume));
    }

    pub fn select_cue(&self, index: usize) {
        self.send(Command::SelectCue(index));
    }

    /// Request teardown. Returns immediately; the task unloads the engine
    /// resource asynchronously and then exits.
    pub fn close(&self) {
        self.send(Command::Close);
    }

    /// Close and wait for the session task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    // ---- observation surface --------------------------------------------

    /// Current snapshot (point-in-time copy).
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot updates for UI binding.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to the session event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Event stream for UI layers that consume `Stream`s. A subscriber that
    /// falls behind skips the lagged events and continues.
    pub fn event_stream(&self) -> impl Stream<Item = SessionEvent> {
        BroadcastStream::new(self.events.subscribe()).filter_map(|item| async move { item.ok() })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("command dropped: session task is gone");
        }
    }
}

/// Serialized message loop: one command, tick, or load resolution at a time.
async fn session_loop(
    mut session: PlaybackSession,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut ticks: TickReceiver,
    mut loads: mpsc::UnboundedReceiver<LoadResolved>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
) {
    info!("session task started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Close) | None => {
                    session.close();
                    let _ = snapshot_tx.send(session.snapshot());
                    break;
                }
                Some(command) => handle_command(&mut session, command).await,
            },
            Some(resolved) = loads.recv() => session.handle_load_resolved(resolved).await,
            Some(tick) = ticks.recv() => session.on_status_tick(tick).await,
        }
        let _ = snapshot_tx.send(session.snapshot());
    }
    info!("session task stopped");
}

async fn handle_command(session: &mut PlaybackSession, command: Command) {
    match command {
        Command::OpenQueue {
            tracks,
            start_index,
        } => session.open_queue(tracks, start_index).await,
        Command::JumpTo(index) => session.jump_to(index).await,
        Command::Play => session.play().await,
        Command::Pause => session.pause().await,
        Command::Seek(fraction) => session.seek_fraction(fraction).await,
        Command::PreviewSeek(fraction) => session.preview_seek_fraction(fraction),
        Command::Skip(delta_ms) => session.skip_ms(delta_ms).await,
        Command::Next => session.next().await,
        Command::Previous => session.previous().await,
        Command::ToggleShuffle => session.toggle_shuffle(),
        Command::CycleRepeat => session.cycle_repeat(),
        Command::SetVolume(volume) => session.set_volume(volume).await,
        Command::SelectCue(index) => session.select_cue(index).await,
        Command::Close => unreachable!("Close handled by the loop"),
    }
}
