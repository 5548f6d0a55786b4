// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless animation driver that records what it is asked to play.

use cutscene_sequencer::AnimationDriver;
use indexmap::IndexMap;
use serde::Serialize;

/// What one layer is showing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerState {
    /// State being played
    pub state: String,
    /// Position inside the state
    pub normalized_time: f32,
    /// Remaining blend-in time, 0 when snapped
    pub blend: f32,
}

/// Animation driver without a skeleton; it keeps per-layer state and logs changes
#[derive(Debug, Default)]
pub struct TracingDriver {
    name: String,
    layers: IndexMap<u32, LayerState>,
    baseline: IndexMap<u32, LayerState>,
    clock: f32,
    paused: bool,
}

impl TracingDriver {
    /// Create a driver
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Driver name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state of every layer
    pub fn layers(&self) -> &IndexMap<u32, LayerState> {
        &self.layers
    }

    /// Total time advanced since the last reset
    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Whether the driver was paused and not ticked since
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn enter(&mut self, state: &str, layer: u32, normalized_time: f32, blend: f32) {
        let changed = self.layers.get(&layer).map_or(true, |current| current.state != state);
        if changed {
            tracing::debug!("{}: layer {} enters '{}'", self.name, layer, state);
        }
        self.layers.insert(
            layer,
            LayerState {
                state: state.to_string(),
                normalized_time,
                blend,
            },
        );
    }
}

impl AnimationDriver for TracingDriver {
    fn capture_baseline(&mut self) {
        self.baseline = self.layers.clone();
    }

    fn restore_baseline(&mut self) {
        self.layers = self.baseline.clone();
    }

    fn play(&mut self, state: &str, layer: u32, normalized_time: f32) {
        self.enter(state, layer, normalized_time, 0.0);
    }

    fn cross_fade(&mut self, state: &str, duration: f32, layer: u32, normalized_time: f32) {
        self.enter(state, layer, normalized_time, duration);
    }

    fn advance(&mut self, delta_time: f32) {
        self.paused = false;
        self.clock += delta_time;
    }

    fn reset_pose(&mut self) {
        self.layers = self.baseline.clone();
        self.clock = 0.0;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn release(&mut self) {
        tracing::debug!("{}: released after {:.2}s", self.name, self.clock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_follow_play_calls() {
        let mut driver = TracingDriver::new("Hero");
        driver.capture_baseline();
        driver.play("Idle", 0, 0.25);
        driver.cross_fade("Wave", 0.2, 1, 0.0);
        driver.advance(0.5);

        assert_eq!(driver.layers()[&0].state, "Idle");
        assert_eq!(driver.layers()[&1].blend, 0.2);
        assert_eq!(driver.clock(), 0.5);

        driver.reset_pose();
        assert!(driver.layers().is_empty());
        assert_eq!(driver.clock(), 0.0);
    }
}
