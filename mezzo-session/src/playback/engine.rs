//! Playback engine adapter boundary
//!
//! The only contract the playback core requires from a platform media engine.
//! Concrete decode/render engines live outside this crate; the session talks
//! to them exclusively through `PlaybackEngineAdapter` plus the status-tick
//! channel handed to the engine at construction time.

use crate::error::Result;
use async_trait::async_trait;
use mezzo_common::types::StatusTick;
use tokio::sync::mpsc;

/// Channel on which an engine pushes its status ticks
pub type TickSender = mpsc::UnboundedSender<StatusTick>;

/// Receiving half owned by the session task
pub type TickReceiver = mpsc::UnboundedReceiver<StatusTick>;

/// Result of a successful `load`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedMedia {
    /// Engine-reported duration, if known at load time. Some engines only
    /// learn the duration once the first ticks arrive.
    pub duration_ms: Option<u64>,
}

/// Boundary contract for a platform media engine.
///
/// Obligations on implementors:
/// - At most one resource is active at a time; `load` replaces any prior
///   resource, `unload` releases it and must be idempotent.
/// - Every status tick pushed after `load(uri, generation)` carries that
///   generation, so the session can discard ticks from superseded loads.
/// - Ticks arrive at an engine-determined cadence (typically hundreds of
///   milliseconds) and never report a position past the known duration.
/// - `play`/`pause`/`seek_to` apply to the currently loaded resource and
///   may be called in any order; failures surface as `Error::Engine`.
#[async_trait]
pub trait PlaybackEngineAdapter: Send {
    /// Load a resolved media URI. Stamps all subsequent ticks with
    /// `generation`.
    async fn load(&mut self, uri: &str, generation: u64) -> Result<LoadedMedia>;

    async fn play(&mut self) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;

    async fn seek_to(&mut self, position_ms: u64) -> Result<()>;

    /// Set output volume, already clamped to [0.0, 1.0] by the session.
    async fn set_volume(&mut self, volume: f64) -> Result<()>;

    /// Release the active resource. Idempotent; calling with nothing loaded
    /// is a no-op.
    async fn unload(&mut self) -> Result<()>;
}

/// Create the status-tick channel shared between an engine and the session
/// task that consumes its ticks.
pub fn tick_channel() -> (TickSender, TickReceiver) {
    mpsc::unbounded_channel()
}
