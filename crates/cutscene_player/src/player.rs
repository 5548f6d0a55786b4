// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-step host loop around a built scene.

use crate::config::PlayerConfig;
use crate::document::Scene;
use crate::error::{PlayerError, Result};
use cutscene_sequencer::{EventMessage, PlaybackEvent, PlaybackState};
use indexmap::IndexMap;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// One recorded lifecycle notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    /// Host time when it happened
    pub host_time: f32,
    /// Last sequence time the listener saw
    pub running_time: f32,
    /// Notification name
    pub kind: String,
}

/// What a run produced
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSummary {
    /// Sequence name
    pub name: String,
    /// Host ticks taken
    pub ticks: u32,
    /// Host time consumed
    pub host_time: f32,
    /// Sequence time at exit
    pub running_time: f32,
    /// Whether the sequence reached its end
    pub finished: bool,
    /// Lifecycle notifications
    pub trace: Vec<TraceEntry>,
    /// Messages posted by events
    pub messages: Vec<(f32, EventMessage)>,
    /// Final member values, per target
    pub targets: IndexMap<String, IndexMap<String, String>>,
}

/// Drives a scene with fixed host ticks
pub struct Player {
    scene: Scene,
    config: PlayerConfig,
    host_time: Rc<Cell<f32>>,
    trace: Rc<RefCell<Vec<TraceEntry>>>,
}

impl Player {
    /// Wrap a scene; config settings override the document's playback flags when set
    pub fn new(mut scene: Scene, config: PlayerConfig) -> Self {
        let host_time = Rc::new(Cell::new(0.0_f32));
        let trace = Rc::new(RefCell::new(Vec::new()));

        if config.looping {
            scene.sequencer.set_looping(true);
        }
        if config.ping_pong {
            scene.sequencer.set_ping_ponging(true);
        }
        scene.sequencer.set_playback_rate(config.playback_rate);

        let clock = host_time.clone();
        let log = trace.clone();
        let sequence_time = Rc::new(Cell::new(0.0_f32));
        scene.sequencer.add_listener(move |event| {
            let kind = match event {
                PlaybackEvent::Started => "started",
                PlaybackEvent::Stopped => "stopped",
                PlaybackEvent::Paused => "paused",
                PlaybackEvent::Finished => "finished",
                PlaybackEvent::RunningTimeSet { running_time } => {
                    sequence_time.set(*running_time);
                    "running_time_set"
                }
                PlaybackEvent::BeforeUpdate { running_time }
                | PlaybackEvent::AfterUpdate { running_time } => {
                    sequence_time.set(*running_time);
                    return;
                }
            };
            log.borrow_mut().push(TraceEntry {
                host_time: clock.get(),
                running_time: sequence_time.get(),
                kind: kind.to_string(),
            });
        });

        Self {
            scene,
            config,
            host_time,
            trace,
        }
    }

    /// The scene being played
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Play until the sequence stops or the time budget runs out
    pub fn run(&mut self) -> Result<PlaybackSummary> {
        let step = self.config.step();
        if step <= 0.0 || !step.is_finite() {
            return Err(PlayerError::InvalidDocument(format!(
                "tick length must be positive, got {step}"
            )));
        }

        tracing::info!(
            "Playing '{}' ({:.2}s, rate {:.2}, step {:.4}s)",
            self.scene.name,
            self.scene.sequencer.duration(),
            self.scene.sequencer.playback_rate(),
            step
        );

        let mut messages = Vec::new();
        let mut ticks = 0_u32;

        if let Some(time) = self.config.skip_to {
            self.scene.sequencer.skip_timeline_to(time);
        } else {
            self.scene.sequencer.play();
        }

        while self.scene.sequencer.is_playing() && self.host_time.get() < self.config.max_duration {
            self.scene.sequencer.update(step);
            ticks += 1;
            self.host_time.set(self.host_time.get() + step);

            for message in self.scene.messages.borrow_mut().drain(..) {
                tracing::info!(
                    "[{:.2}] {} {:?}",
                    self.scene.sequencer.running_time(),
                    message.name,
                    message.kind
                );
                messages.push((self.scene.sequencer.running_time(), message));
            }
        }

        let state = self.scene.sequencer.state();
        if state == PlaybackState::Playing {
            tracing::warn!(
                "'{}' still playing after {:.2}s of host time",
                self.scene.name,
                self.config.max_duration
            );
        }

        let summary = PlaybackSummary {
            name: self.scene.name.clone(),
            ticks,
            host_time: self.host_time.get(),
            running_time: self.scene.sequencer.running_time(),
            finished: self
                .trace
                .borrow()
                .iter()
                .any(|entry| entry.kind == "finished"),
            trace: self.trace.borrow().clone(),
            messages,
            targets: self.final_values(),
        };

        if let Some(path) = &self.config.trace_json {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(file, &summary)?;
            tracing::info!("Wrote trace to {}", path.display());
        }

        tracing::info!(
            "Done after {} ticks: running time {:.2}, state {}",
            summary.ticks,
            summary.running_time,
            state.name()
        );
        Ok(summary)
    }

    fn final_values(&self) -> IndexMap<String, IndexMap<String, String>> {
        self.scene
            .targets
            .iter()
            .map(|(name, target)| {
                let handle = target.handle.borrow();
                let members = target
                    .members
                    .iter()
                    .filter_map(|path| {
                        handle.get(path).map(|value| (path.to_string(), format!("{value:?}")))
                    })
                    .collect();
                (name.clone(), members)
            })
            .collect()
    }
}
