//! # Mezzo Session
//!
//! The playback core behind every player screen: one `PlaybackSession` state
//! machine plus `Queue` and `CueTrack`, reached through the serialized
//! `TransportFacade`. Platform media engines plug in behind the
//! `PlaybackEngineAdapter` boundary; a timer-driven `SimulatedEngine` covers
//! media with no native resource (pure lyric timelines) and tests.
//!
//! ```no_run
//! use mezzo_common::types::Track;
//! use mezzo_session::config::PlayerConfig;
//! use mezzo_session::playback::{tick_channel, SimulatedEngine, TransportFacade};
//!
//! # async fn demo() {
//! let (tick_tx, tick_rx) = tick_channel();
//! let engine = SimulatedEngine::new(tick_tx);
//! let facade = TransportFacade::spawn(Box::new(engine), tick_rx, PlayerConfig::default());
//!
//! facade.open_queue(vec![Track::new("file:///song.mp3")], 0);
//! let mut snapshots = facade.subscribe();
//! # let _ = snapshots.changed().await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod playback;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use playback::{
    PlaybackEngineAdapter, PlaybackSession, Queue, SimulatedEngine, TransportFacade,
};
