//! Shared helpers for mezzo-session integration tests
//!
//! Each integration test binary uses a different subset of these.
#![allow(dead_code)]

use async_trait::async_trait;
use mezzo_common::types::{SessionSnapshot, Track};
use mezzo_session::playback::{LoadedMedia, PlaybackEngineAdapter};
use mezzo_session::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

/// Scripted engine for integration tests: records every command, optionally
/// delays loads, and never produces ticks on its own (tests inject ticks
/// through the tick channel directly).
pub struct RecordingEngine {
    log: Arc<Mutex<Vec<String>>>,
    load_delay: Duration,
    failing_uris: Vec<String>,
    duration_ms: u64,
}

impl RecordingEngine {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = Self {
            log: Arc::clone(&log),
            load_delay: Duration::ZERO,
            failing_uris: Vec::new(),
            duration_ms: 45_000,
        };
        (engine, log)
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    #[allow(dead_code)]
    pub fn with_failing_uri(mut self, uri: impl Into<String>) -> Self {
        self.failing_uris.push(uri.into());
        self
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl PlaybackEngineAdapter for RecordingEngine {
    async fn load(&mut self, uri: &str, generation: u64) -> Result<LoadedMedia> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.record(format!("load {uri} gen={generation}"));
        if self.failing_uris.iter().any(|u| u == uri) {
            return Err(Error::Load(format!("cannot open media: {uri}")));
        }
        Ok(LoadedMedia {
            duration_ms: Some(self.duration_ms),
        })
    }

    async fn play(&mut self) -> Result<()> {
        self.record("play".into());
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.record("pause".into());
        Ok(())
    }

    async fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        self.record(format!("seek {position_ms}"));
        Ok(())
    }

    async fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.record(format!("volume {volume}"));
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        self.record("unload".into());
        Ok(())
    }
}

/// Opt-in test logging: `RUST_LOG=mezzo_session=debug cargo test -- --nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait until the snapshot satisfies `pred`, panicking after `deadline`.
pub async fn wait_for_snapshot(
    rx: &mut watch::Receiver<SessionSnapshot>,
    deadline: Duration,
    pred: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    timeout(deadline, rx.wait_for(pred))
        .await
        .expect("snapshot condition not reached before deadline")
        .expect("session task gone")
        .clone()
}

pub fn track(uri: &str) -> Track {
    Track::new(uri)
}

#[allow(dead_code)]
pub fn tracks(n: usize) -> Vec<Track> {
    (0..n).map(|i| track(&format!("file:///{i}.mp3"))).collect()
}
