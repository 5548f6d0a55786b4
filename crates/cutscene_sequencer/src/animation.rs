// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation clip timing.
//!
//! The sequencer does not own a skeleton. It tells an [`AnimationDriver`]
//! which state to play on which layer at which normalized time, and ticks the
//! driver forward in fixed sub-steps so that blends come out the same no
//! matter how large the host's frame delta is.

use crate::sequencer::SEQUENCE_UPDATE_RATE;
use crate::track::{Track, TrackContext, TrackId, TrackType};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Most driver sub-steps a single process call makes
pub const MAX_SUB_STEPS: u32 = 10_000;

/// One clip placed on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClipData {
    /// State to play on the driver
    pub state_name: String,
    /// Time the clip starts
    pub start_time: f32,
    /// Length of one pass through the state
    pub state_duration: f32,
    /// How long the clip stays on the timeline
    pub playback_duration: f32,
    /// Blend in from the previous state instead of snapping
    #[serde(default)]
    pub cross_fade: bool,
    /// Length of the blend-in
    #[serde(default)]
    pub transition_duration: f32,
}

impl AnimationClipData {
    /// A clip playing `state_name` once from `start_time`
    pub fn new(state_name: impl Into<String>, start_time: f32, state_duration: f32) -> Self {
        Self {
            state_name: state_name.into(),
            start_time: start_time.max(0.0),
            state_duration,
            playback_duration: state_duration,
            cross_fade: false,
            transition_duration: 0.0,
        }
    }

    /// Blend in over `duration`
    pub fn with_cross_fade(mut self, duration: f32) -> Self {
        self.cross_fade = true;
        self.transition_duration = duration.max(0.0);
        self
    }

    /// Keep the clip on the timeline for `duration`
    pub fn with_playback_duration(mut self, duration: f32) -> Self {
        self.playback_duration = duration.max(0.0);
        self
    }

    /// Time the clip leaves the timeline
    pub fn end_time(&self) -> f32 {
        self.start_time + self.playback_duration
    }

    /// Whether the clip covers `time`
    pub fn is_running(&self, time: f32) -> bool {
        time >= self.start_time && time < self.end_time()
    }

    /// Position inside the state at `time`, 1.0 per pass
    pub fn normalized_time(&self, time: f32) -> f32 {
        if self.state_duration <= 0.0 {
            return 0.0;
        }
        (time - self.start_time) / self.state_duration
    }

    /// Remaining blend-in time at `time`, never negative
    pub fn cross_fade_time(&self, time: f32) -> f32 {
        (self.transition_duration - (time - self.start_time)).max(0.0)
    }
}

/// The host's animation system, seen from the sequencer
pub trait AnimationDriver {
    /// Remember the pose and state to come back to on stop
    fn capture_baseline(&mut self);

    /// Go back to the captured pose and state
    fn restore_baseline(&mut self);

    /// Snap to a state on a layer
    fn play(&mut self, state: &str, layer: u32, normalized_time: f32);

    /// Blend to a state on a layer over `duration`
    fn cross_fade(&mut self, state: &str, duration: f32, layer: u32, normalized_time: f32);

    /// Tick the driver
    fn advance(&mut self, delta_time: f32);

    /// Return to the captured state without ending the sequence
    fn reset_pose(&mut self);

    /// Playback paused
    fn pause(&mut self) {}

    /// Sequence finished; hand control back to the host
    fn release(&mut self) {}
}

/// Driver shared between the host and animation tracks
pub type SharedDriver = Rc<RefCell<dyn AnimationDriver>>;

/// Clips playing on one driver layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipLane {
    /// Driver layer
    pub layer: u32,
    /// Clips on this layer
    pub clips: Vec<AnimationClipData>,
}

/// Track driving an animation system through clip placements
pub struct AnimationTrack {
    id: TrackId,
    name: String,
    driver: Weak<RefCell<dyn AnimationDriver>>,
    lanes: Vec<ClipLane>,
    previous_time: f32,
}

impl AnimationTrack {
    /// Create a track for `driver`
    pub fn new(name: impl Into<String>, driver: &SharedDriver) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            driver: Rc::downgrade(driver),
            lanes: Vec::new(),
            previous_time: 0.0,
        }
    }

    /// Place a clip on a layer
    pub fn add_clip(&mut self, layer: u32, clip: AnimationClipData) {
        match self.lanes.iter_mut().find(|l| l.layer == layer) {
            Some(lane) => lane.clips.push(clip),
            None => self.lanes.push(ClipLane {
                layer,
                clips: vec![clip],
            }),
        }
    }

    /// Remove every clip with this state name from a layer
    pub fn remove_clips(&mut self, layer: u32, state_name: &str) -> usize {
        let Some(lane) = self.lanes.iter_mut().find(|l| l.layer == layer) else {
            return 0;
        };
        let before = lane.clips.len();
        lane.clips.retain(|c| c.state_name != state_name);
        before - lane.clips.len()
    }

    /// All layers
    pub fn lanes(&self) -> &[ClipLane] {
        &self.lanes
    }

    /// Latest time any clip is still on the timeline
    pub fn duration(&self) -> f32 {
        self.lanes
            .iter()
            .flat_map(|l| l.clips.iter())
            .map(AnimationClipData::end_time)
            .fold(0.0, f32::max)
    }

    fn play_running_clips(&self, driver: &mut dyn AnimationDriver, time: f32) {
        let mut running: Vec<(u32, &AnimationClipData)> = self
            .lanes
            .iter()
            .flat_map(|lane| lane.clips.iter().map(move |clip| (lane.layer, clip)))
            .filter(|(_, clip)| clip.is_running(time))
            .collect();
        running.sort_by(|a, b| a.1.start_time.total_cmp(&b.1.start_time));

        for (layer, clip) in running {
            let normalized = clip.normalized_time(time);
            if clip.cross_fade {
                driver.cross_fade(&clip.state_name, clip.cross_fade_time(time), layer, normalized);
            } else {
                driver.play(&clip.state_name, layer, normalized);
            }
        }
    }
}

impl std::fmt::Debug for AnimationTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationTrack")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lanes", &self.lanes)
            .field("previous_time", &self.previous_time)
            .finish_non_exhaustive()
    }
}

impl Track for AnimationTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn track_type(&self) -> TrackType {
        TrackType::Animation
    }

    fn start_timeline(&mut self, _ctx: &TrackContext<'_>) {
        if let Some(driver) = self.driver.upgrade() {
            driver.borrow_mut().capture_baseline();
        }
        self.previous_time = 0.0;
    }

    fn process(&mut self, _ctx: &TrackContext<'_>, sequence_time: f32, _playback_rate: f32) {
        if !sequence_time.is_finite() {
            tracing::warn!("Animation track '{}' ignoring time {}", self.name, sequence_time);
            return;
        }
        let Some(driver) = self.driver.upgrade() else {
            return;
        };
        let mut driver = driver.borrow_mut();

        if sequence_time < self.previous_time {
            tracing::debug!(
                "Animation track '{}' replaying from 0 to {}",
                self.name,
                sequence_time
            );
            driver.reset_pose();
            self.previous_time = 0.0;
        }

        let span = sequence_time - self.previous_time;
        if span > 0.0 {
            let steps = (span / SEQUENCE_UPDATE_RATE).ceil().min(MAX_SUB_STEPS as f32) as u32;
            // Wider than the update rate only once the step count hits the cap
            let stride = (span / steps as f32).max(SEQUENCE_UPDATE_RATE);
            let mut running_time = self.previous_time;
            for _ in 0..steps {
                let step = (sequence_time - running_time).min(stride);
                if step <= 0.0 {
                    break;
                }
                running_time += step;
                self.play_running_clips(&mut *driver, running_time);
                driver.advance(step);
            }
        }
        self.previous_time = sequence_time;
    }

    fn pause_timeline(&mut self, _ctx: &TrackContext<'_>) {
        if let Some(driver) = self.driver.upgrade() {
            driver.borrow_mut().pause();
        }
    }

    fn stop_timeline(&mut self, _ctx: &TrackContext<'_>) {
        if let Some(driver) = self.driver.upgrade() {
            let mut driver = driver.borrow_mut();
            driver.reset_pose();
            driver.restore_baseline();
        }
        self.previous_time = 0.0;
    }

    fn end_timeline(&mut self, _ctx: &TrackContext<'_>) {
        if let Some(driver) = self.driver.upgrade() {
            driver.borrow_mut().release();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        advanced: f32,
        steps: usize,
        resets: usize,
        restored: usize,
        last_play: Option<(String, u32, f32)>,
        last_fade: Option<(String, f32)>,
    }

    impl AnimationDriver for Recorder {
        fn capture_baseline(&mut self) {}

        fn restore_baseline(&mut self) {
            self.restored += 1;
        }

        fn play(&mut self, state: &str, layer: u32, normalized_time: f32) {
            self.last_play = Some((state.to_string(), layer, normalized_time));
        }

        fn cross_fade(&mut self, state: &str, duration: f32, _layer: u32, _normalized_time: f32) {
            self.last_fade = Some((state.to_string(), duration));
        }

        fn advance(&mut self, delta_time: f32) {
            self.advanced += delta_time;
            self.steps += 1;
        }

        fn reset_pose(&mut self) {
            self.resets += 1;
            self.advanced = 0.0;
        }
    }

    fn ctx() -> TrackContext<'static> {
        TrackContext::detached(0.0, true)
    }

    #[test]
    fn test_clip_timing() {
        let clip = AnimationClipData::new("Walk", 1.0, 2.0).with_cross_fade(0.5);
        assert!(!clip.is_running(0.5));
        assert!(clip.is_running(1.0));
        assert!(!clip.is_running(3.0));
        assert!((clip.normalized_time(2.0) - 0.5).abs() < 1e-6);
        assert!((clip.cross_fade_time(1.2) - 0.3).abs() < 1e-6);
        assert_eq!(clip.cross_fade_time(2.0), 0.0);
    }

    #[test]
    fn test_forward_sub_steps() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let driver: SharedDriver = recorder.clone();
        let mut track = AnimationTrack::new("Body", &driver);
        track.add_clip(0, AnimationClipData::new("Idle", 0.0, 1.0));

        track.start_timeline(&ctx());
        track.process(&ctx(), 0.05, 1.0);

        let recorder = recorder.borrow();
        assert!((recorder.advanced - 0.05).abs() < 1e-5);
        let (state, layer, normalized) = recorder.last_play.clone().unwrap();
        assert_eq!(state, "Idle");
        assert_eq!(layer, 0);
        assert!((normalized - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_cross_fade_clip_uses_blend() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let driver: SharedDriver = recorder.clone();
        let mut track = AnimationTrack::new("Body", &driver);
        track.add_clip(1, AnimationClipData::new("Run", 0.0, 1.0).with_cross_fade(0.5));

        track.process(&ctx(), 0.1, 1.0);
        let (state, duration) = recorder.borrow().last_fade.clone().unwrap();
        assert_eq!(state, "Run");
        assert!((duration - 0.4).abs() < 1e-4);
    }

    #[test]
    fn test_backward_resets_and_replays() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let driver: SharedDriver = recorder.clone();
        let mut track = AnimationTrack::new("Body", &driver);
        track.add_clip(0, AnimationClipData::new("Idle", 0.0, 1.0));

        track.process(&ctx(), 0.5, 1.0);
        track.process(&ctx(), 0.2, 1.0);
        assert_eq!(recorder.borrow().resets, 1);
        assert!((recorder.borrow().advanced - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_long_jumps_are_bounded() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let driver: SharedDriver = recorder.clone();
        let mut track = AnimationTrack::new("Body", &driver);
        track.add_clip(0, AnimationClipData::new("Idle", 0.0, 1.0));

        track.process(&ctx(), f32::INFINITY, 1.0);
        track.process(&ctx(), f32::NAN, 1.0);
        assert_eq!(recorder.borrow().steps, 0);

        track.process(&ctx(), 1.0e6, 1.0);
        let recorder = recorder.borrow();
        assert_eq!(recorder.steps, MAX_SUB_STEPS as usize);
        assert!((recorder.advanced - 1.0e6).abs() < 1.0);
    }

    #[test]
    fn test_stop_restores_baseline() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let driver: SharedDriver = recorder.clone();
        let mut track = AnimationTrack::new("Body", &driver);
        track.process(&ctx(), 0.3, 1.0);
        track.stop_timeline(&ctx());
        assert_eq!(recorder.borrow().restored, 1);
        assert_eq!(recorder.borrow().advanced, 0.0);
    }

    #[test]
    fn test_dropped_driver_is_skipped() {
        let driver: SharedDriver = Rc::new(RefCell::new(Recorder::default()));
        let mut track = AnimationTrack::new("Body", &driver);
        drop(driver);
        track.process(&ctx(), 1.0, 1.0);
        track.stop_timeline(&ctx());
    }

    #[test]
    fn test_lanes_and_duration() {
        let driver: SharedDriver = Rc::new(RefCell::new(Recorder::default()));
        let mut track = AnimationTrack::new("Body", &driver);
        track.add_clip(0, AnimationClipData::new("Idle", 0.0, 1.0));
        track.add_clip(0, AnimationClipData::new("Wave", 1.0, 2.0));
        track.add_clip(2, AnimationClipData::new("Blink", 0.5, 0.2));
        assert_eq!(track.lanes().len(), 2);
        assert_eq!(track.duration(), 3.0);
        assert_eq!(track.remove_clips(0, "Wave"), 1);
        assert_eq!(track.remove_clips(5, "Wave"), 0);
    }
}
