//! Simulated playback engine
//!
//! A timer-driven engine for media with no native resource behind it, most
//! notably pure lyric-timeline playback, and for integration tests. Progress
//! is fabricated from wall-clock elapsed time on a plain interval timer; the
//! reported position is clamped so it never passes the configured duration,
//! and the timer is cancelled on pause, seek, and unload.

use crate::error::{Error, Result};
use crate::playback::engine::{LoadedMedia, PlaybackEngineAdapter, TickSender};
use async_trait::async_trait;
use mezzo_common::types::StatusTick;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::debug;

const DEFAULT_DURATION_MS: u64 = 180_000;
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Position/playing state shared between the engine and its timer task
#[derive(Debug)]
struct SimState {
    position_ms: u64,
    playing: bool,
    finished: bool,
}

struct SimResource {
    generation: u64,
    duration_ms: u64,
    state: Arc<Mutex<SimState>>,
    timer: Option<JoinHandle<()>>,
}

impl SimResource {
    fn stop_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        self.state.lock().unwrap().playing = false;
    }
}

/// Interval-timer engine fabricating status ticks from wall-clock progress.
pub struct SimulatedEngine {
    ticks: TickSender,
    tick_interval: Duration,
    default_duration_ms: u64,
    /// Per-URI durations; unknown URIs get the default
    durations: HashMap<String, u64>,
    /// URIs that refuse to load, for failure-path tests
    failing_uris: Vec<String>,
    volume: f64,
    resource: Option<SimResource>,
}

impl SimulatedEngine {
    pub fn new(ticks: TickSender) -> Self {
        Self {
            ticks,
            tick_interval: DEFAULT_TICK_INTERVAL,
            default_duration_ms: DEFAULT_DURATION_MS,
            durations: HashMap::new(),
            failing_uris: Vec::new(),
            volume: 1.0,
            resource: None,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_default_duration(mut self, duration_ms: u64) -> Self {
        self.default_duration_ms = duration_ms;
        self
    }

    /// Register a known media URI with its duration
    pub fn with_media(mut self, uri: impl Into<String>, duration_ms: u64) -> Self {
        self.durations.insert(uri.into(), duration_ms);
        self
    }

    /// Register a URI whose load always fails
    pub fn with_failing_uri(mut self, uri: impl Into<String>) -> Self {
        self.failing_uris.push(uri.into());
        self
    }

    fn send_tick(&self, resource: &SimResource) {
        let state = resource.state.lock().unwrap();
        let _ = self.ticks.send(StatusTick {
            generation: resource.generation,
            position_ms: state.position_ms,
            duration_ms: Some(resource.duration_ms),
            is_playing: state.playing,
            did_finish: state.finished,
        });
    }

    fn start_timer(&mut self) {
        let resource = match self.resource.as_mut() {
            Some(r) => r,
            None => return,
        };
        if resource.timer.is_some() {
            return;
        }

        let state = Arc::clone(&resource.state);
        let ticks = self.ticks.clone();
        let generation = resource.generation;
        let duration_ms = resource.duration_ms;
        let period = self.tick_interval;

        resource.timer = Some(tokio::spawn(async move {
            let base_ms = state.lock().unwrap().position_ms;
            let started = Instant::now();
            let mut timer = interval(period);
            // The first interval tick completes immediately; consume it so
            // the loop below reports elapsed time, not zero
            timer.tick().await;

            loop {
                timer.tick().await;
                let elapsed = started.elapsed().as_millis() as u64;
                // Clamped: the simulated position never passes the duration
                let position_ms = (base_ms + elapsed).min(duration_ms);
                let finished = position_ms >= duration_ms;

                {
                    let mut s = state.lock().unwrap();
                    if !s.playing {
                        // Paused or unloaded between ticks
                        return;
                    }
                    s.position_ms = position_ms;
                    if finished {
                        s.playing = false;
                        s.finished = true;
                    }
                }

                let _ = ticks.send(StatusTick {
                    generation,
                    position_ms,
                    duration_ms: Some(duration_ms),
                    is_playing: !finished,
                    did_finish: finished,
                });

                if finished {
                    return;
                }
            }
        }));
    }
}

#[async_trait]
impl PlaybackEngineAdapter for SimulatedEngine {
    async fn load(&mut self, uri: &str, generation: u64) -> Result<LoadedMedia> {
        // Replace any prior resource
        if let Some(mut resource) = self.resource.take() {
            resource.stop_timer();
        }

        if self.failing_uris.iter().any(|u| u == uri) {
            debug!(uri, "simulated load failure");
            return Err(Error::Load(format!("cannot open media: {uri}")));
        }

        let duration_ms = self
            .durations
            .get(uri)
            .copied()
            .unwrap_or(self.default_duration_ms);

        self.resource = Some(SimResource {
            generation,
            duration_ms,
            state: Arc::new(Mutex::new(SimState {
                position_ms: 0,
                playing: false,
                finished: false,
            })),
            timer: None,
        });

        debug!(uri, generation, duration_ms, "simulated media loaded");
        Ok(LoadedMedia {
            duration_ms: Some(duration_ms),
        })
    }

    async fn play(&mut self) -> Result<()> {
        {
            let resource = self
                .resource
                .as_mut()
                .ok_or_else(|| Error::Engine("play with no media loaded".into()))?;
            let mut state = resource.state.lock().unwrap();
            if state.finished {
                // Play after natural end restarts from zero
                state.position_ms = 0;
                state.finished = false;
            }
            state.playing = true;
        }
        self.start_timer();
        if let Some(resource) = &self.resource {
            self.send_tick(resource);
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.resource
            .as_mut()
            .ok_or_else(|| Error::Engine("pause with no media loaded".into()))?
            .stop_timer();
        if let Some(resource) = &self.resource {
            self.send_tick(resource);
        }
        Ok(())
    }

    async fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        let was_playing = {
            let resource = self
                .resource
                .as_mut()
                .ok_or_else(|| Error::Engine("seek with no media loaded".into()))?;
            let was_playing = {
                let mut state = resource.state.lock().unwrap();
                let was_playing = state.playing || resource.timer.is_some();
                state.position_ms = position_ms.min(resource.duration_ms);
                state.finished = false;
                was_playing
            };
            // Reposition restarts the timer from the new base
            resource.stop_timer();
            if was_playing {
                resource.state.lock().unwrap().playing = true;
            }
            was_playing
        };
        if was_playing {
            self.start_timer();
        }
        if let Some(resource) = &self.resource {
            self.send_tick(resource);
        }
        Ok(())
    }

    async fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.volume = volume;
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        // Idempotent: unloading with nothing loaded is a no-op
        if let Some(mut resource) = self.resource.take() {
            resource.stop_timer();
            debug!(generation = resource.generation, "simulated media unloaded");
        }
        Ok(())
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            resource.stop_timer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::engine::tick_channel;
    use tokio::time::timeout;

    #[tokio::test]
    async fn load_play_produces_generation_stamped_ticks() {
        let (tx, mut rx) = tick_channel();
        let mut engine = SimulatedEngine::new(tx)
            .with_tick_interval(Duration::from_millis(10))
            .with_media("file:///a.mp3", 5_000);

        engine.load("file:///a.mp3", 3).await.unwrap();
        engine.play().await.unwrap();

        let tick = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("tick within deadline")
            .expect("channel open");
        assert_eq!(tick.generation, 3);
        assert_eq!(tick.duration_ms, Some(5_000));
        engine.unload().await.unwrap();
    }

    #[tokio::test]
    async fn short_track_finishes_with_final_tick() {
        let (tx, mut rx) = tick_channel();
        let mut engine = SimulatedEngine::new(tx)
            .with_tick_interval(Duration::from_millis(10))
            .with_media("file:///short.mp3", 40);

        engine.load("file:///short.mp3", 1).await.unwrap();
        engine.play().await.unwrap();

        let finish = timeout(Duration::from_secs(2), async {
            while let Some(tick) = rx.recv().await {
                assert!(tick.position_ms <= 40, "position past duration");
                if tick.did_finish {
                    return tick;
                }
            }
            panic!("channel closed before finish");
        })
        .await
        .expect("finish within deadline");

        assert_eq!(finish.position_ms, 40);
        assert!(!finish.is_playing);
    }

    #[tokio::test]
    async fn unload_is_idempotent_and_stops_ticks() {
        let (tx, mut rx) = tick_channel();
        let mut engine = SimulatedEngine::new(tx)
            .with_tick_interval(Duration::from_millis(10))
            .with_media("file:///a.mp3", 60_000);

        engine.load("file:///a.mp3", 1).await.unwrap();
        engine.play().await.unwrap();
        engine.unload().await.unwrap();
        engine.unload().await.unwrap();

        // Drain anything sent before unload, then confirm silence
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failing_uri_surfaces_load_error() {
        let (tx, _rx) = tick_channel();
        let mut engine = SimulatedEngine::new(tx).with_failing_uri("bad://nope");
        let result = engine.load("bad://nope", 1).await;
        assert!(matches!(result, Err(Error::Load(_))));
    }

    #[tokio::test]
    async fn seek_clamps_to_duration() {
        let (tx, mut rx) = tick_channel();
        let mut engine = SimulatedEngine::new(tx)
            .with_tick_interval(Duration::from_millis(10))
            .with_media("file:///a.mp3", 10_000);

        engine.load("file:///a.mp3", 1).await.unwrap();
        engine.seek_to(99_999).await.unwrap();

        let tick = rx.recv().await.expect("confirmation tick");
        assert_eq!(tick.position_ms, 10_000);
    }
}
