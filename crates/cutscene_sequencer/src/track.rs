// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track lifecycle shared by every track kind.
//!
//! Every track goes through `Fresh -> Started -> {Playing, Paused} -> Stopped`.
//! The sequencer drives these transitions through its containers; a track only
//! reacts to them. `skip_timeline_to` may happen in any state and never changes
//! playback flags.

use crate::binding::TargetRef;
use serde::{Deserialize, Serialize};
use std::any::Any;
use uuid::Uuid;

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackType {
    /// Property curves applied to the target
    Property,
    /// Discrete events with optional durations
    Event,
    /// Camera cuts and transitions
    Observer,
    /// Target moved along a spline
    ObjectPath,
    /// Animation clips played on a driver
    Animation,
    /// Host-defined track
    Custom,
}

impl TrackType {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Property => "Property",
            Self::Event => "Event",
            Self::Observer => "Observer",
            Self::ObjectPath => "Object Path",
            Self::Animation => "Animation",
            Self::Custom => "Custom",
        }
    }
}

/// What a track can see of its surroundings during a lifecycle call
#[derive(Debug, Clone, Copy)]
pub struct TrackContext<'a> {
    /// The container's target, if one is bound
    pub target: Option<&'a TargetRef>,
    /// Sequencer running time at the moment of the call
    pub running_time: f32,
    /// Whether the sequencer is playing
    pub is_playing: bool,
}

impl<'a> TrackContext<'a> {
    /// Context without a target
    pub fn detached(running_time: f32, is_playing: bool) -> Self {
        Self {
            target: None,
            running_time,
            is_playing,
        }
    }

    /// The target, only if it is still alive
    pub fn live_target(&self) -> Option<&'a TargetRef> {
        self.target.filter(|t| t.is_alive())
    }
}

/// A lane of keyed data driving one aspect of a target
pub trait Track: Any {
    /// Track ID
    fn id(&self) -> TrackId;

    /// Track name
    fn name(&self) -> &str;

    /// Track kind
    fn track_type(&self) -> TrackType;

    /// Whether stop/end need a live container target.
    ///
    /// Camera tracks act on their own camera rig and return `false`.
    fn requires_target(&self) -> bool {
        true
    }

    /// One-time entry when playback starts from fresh
    fn start_timeline(&mut self, _ctx: &TrackContext<'_>) {}

    /// Advance to absolute `sequence_time`; may jump either way
    fn process(&mut self, ctx: &TrackContext<'_>, sequence_time: f32, playback_rate: f32);

    /// Suspend without losing state
    fn pause_timeline(&mut self, _ctx: &TrackContext<'_>) {}

    /// Continue after a pause
    fn resume_timeline(&mut self, _ctx: &TrackContext<'_>) {}

    /// Unwind everything the track has applied and reset to time zero
    fn stop_timeline(&mut self, _ctx: &TrackContext<'_>) {}

    /// Playback reached the end without looping
    fn end_timeline(&mut self, _ctx: &TrackContext<'_>) {}

    /// Jump to `time` without regular event firing
    fn skip_timeline_to(&mut self, ctx: &TrackContext<'_>, time: f32) {
        self.process(ctx, time, 1.0);
    }

    /// Set a preview time outside of playback
    fn manually_set_time(&mut self, _ctx: &TrackContext<'_>, _time: f32) {}

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
