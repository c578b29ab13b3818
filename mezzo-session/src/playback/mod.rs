//! Playback core: session state machine, queue, cues, engine boundary

pub mod cue;
pub mod engine;
pub mod queue;
pub mod session;
pub mod sim;
pub mod transport;

pub use cue::CueTrack;
pub use engine::{tick_channel, LoadedMedia, PlaybackEngineAdapter, TickReceiver, TickSender};
pub use queue::{AdvanceOutcome, PreviousOutcome, Queue};
pub use session::PlaybackSession;
pub use sim::SimulatedEngine;
pub use transport::{Command, TransportFacade};
