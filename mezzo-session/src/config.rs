//! Player configuration
//!
//! Small TOML-backed configuration for session policy knobs. Resolution
//! priority: explicit path argument, then the `MEZZO_CONFIG` environment
//! variable, then compiled defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an alternate config file path
pub const CONFIG_ENV_VAR: &str = "MEZZO_CONFIG";

/// Session policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Start playing immediately once a load resolves
    pub autoplay_on_open: bool,

    /// Initial master volume (0.0-1.0)
    pub initial_volume: f64,

    /// `previous()` restarts the current track instead of moving back when
    /// elapsed position exceeds this threshold
    pub previous_restart_threshold_ms: u64,

    /// Tick cadence of the simulated engine (lyric-timeline playback)
    pub simulated_tick_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay_on_open: true,
            initial_volume: 0.75,
            previous_restart_threshold_ms: 3_000,
            simulated_tick_interval_ms: 250,
        }
    }
}

impl PlayerConfig {
    /// Load configuration, falling back to defaults when no file is present.
    ///
    /// Priority order:
    /// 1. Explicit `path` argument
    /// 2. `MEZZO_CONFIG` environment variable
    /// 3. Compiled defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&env_path));
        }

        Ok(Self::default())
    }

    /// Parse configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PlayerConfig =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "initial_volume must be within 0.0-1.0, got {}",
                self.initial_volume
            )));
        }
        if self.simulated_tick_interval_ms == 0 {
            return Err(Error::Config(
                "simulated_tick_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PlayerConfig::default();
        assert!(config.autoplay_on_open);
        assert_eq!(config.initial_volume, 0.75);
        assert_eq!(config.previous_restart_threshold_ms, 3_000);
    }

    #[test]
    fn parses_partial_toml() {
        let config = PlayerConfig::from_toml_str("autoplay_on_open = false\n").unwrap();
        assert!(!config.autoplay_on_open);
        // Unspecified keys keep their defaults
        assert_eq!(config.simulated_tick_interval_ms, 250);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mezzo.toml");
        std::fs::write(&path, "initial_volume = 0.5\nprevious_restart_threshold_ms = 5000\n")
            .unwrap();

        let config = PlayerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.initial_volume, 0.5);
        assert_eq!(config.previous_restart_threshold_ms, 5_000);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let result = PlayerConfig::from_toml_str("initial_volume = 1.5\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let result = PlayerConfig::from_toml_str("simulated_tick_interval_ms = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
