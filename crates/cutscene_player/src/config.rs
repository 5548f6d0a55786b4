// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player settings, persisted as RON.

use crate::error::Result;
use cutscene_sequencer::SEQUENCE_UPDATE_RATE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the player drives a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Host tick length at a time scale of 1
    pub update_rate: f32,
    /// Global time multiplier applied to the tick length
    pub time_scale: f32,
    /// Simulated host time after which the player gives up
    pub max_duration: f32,
    /// Loop the sequence
    pub looping: bool,
    /// Bounce at both ends
    pub ping_pong: bool,
    /// Playback rate handed to the sequencer
    pub playback_rate: f32,
    /// Skip to this time right after starting
    pub skip_to: Option<f32>,
    /// Write the playback trace here as JSON
    pub trace_json: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            update_rate: SEQUENCE_UPDATE_RATE,
            time_scale: 1.0,
            max_duration: 60.0,
            looping: false,
            ping_pong: false,
            playback_rate: 1.0,
            skip_to: None,
            trace_json: None,
        }
    }
}

impl PlayerConfig {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Seconds of host time per tick
    pub fn step(&self) -> f32 {
        self.update_rate * self.time_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_step() {
        let config = PlayerConfig::default();
        assert!((config.step() - 0.01).abs() < 1e-6);

        let scaled = PlayerConfig {
            time_scale: 0.5,
            ..PlayerConfig::default()
        };
        assert!((scaled.step() - 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PlayerConfig = ron::from_str("(looping: true, skip_to: Some(2.5))").unwrap();
        assert!(config.looping);
        assert_eq!(config.skip_to, Some(2.5));
        assert_eq!(config.playback_rate, 1.0);
        assert!(config.trace_json.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("cutscene_player_{}.ron", std::process::id()));
        let config = PlayerConfig {
            ping_pong: true,
            playback_rate: -2.0,
            ..PlayerConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = PlayerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_demo_config_parses() {
        let config: PlayerConfig =
            ron::from_str(include_str!("../../../demos/player.ron")).unwrap();
        assert_eq!(config.max_duration, 30.0);
    }
}
