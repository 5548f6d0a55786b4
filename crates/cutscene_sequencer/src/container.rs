// SPDX-License-Identifier: MIT OR Apache-2.0
//! Groups of tracks bound to one target.

use crate::binding::{SharedTarget, TargetRef};
use crate::error::{Result, SequencerError};
use crate::track::{Track, TrackContext, TrackId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub Uuid);

impl ContainerId {
    /// Create a new random container ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks that all act on the same target, processed in insertion order
pub struct TrackContainer {
    id: ContainerId,
    /// Display name
    pub name: String,
    /// Ordering key among containers
    pub index: i32,
    target: Option<TargetRef>,
    tracks: Vec<Box<dyn Track>>,
    active: bool,
}

impl TrackContainer {
    /// Create a container with no target, for tracks that need none
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ContainerId::new(),
            name: name.into(),
            index: 0,
            target: None,
            tracks: Vec::new(),
            active: true,
        }
    }

    /// Create a container bound to `target`
    pub fn with_target(target: &SharedTarget) -> Self {
        let name = format!("Timelines for {}", target.borrow().name());
        Self {
            target: Some(TargetRef::new(target)),
            ..Self::new(name)
        }
    }

    /// Container ID
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Bound target handle
    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    /// Rebind to another target
    pub fn set_target(&mut self, target: Option<&SharedTarget>) {
        self.target = target.map(TargetRef::new);
    }

    /// Whether the container is bound to `target`
    pub fn is_bound_to(&self, target: &SharedTarget) -> bool {
        self.target.as_ref().is_some_and(|t| t.points_to(target))
    }

    /// Whether the bound target is still alive
    pub fn has_valid_target(&self) -> bool {
        self.target.as_ref().is_some_and(TargetRef::is_alive)
    }

    /// Whether the container takes part in processing
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Include or exclude the container from processing
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Add a track; returns its ID
    pub fn add_track(&mut self, track: Box<dyn Track>) -> TrackId {
        let id = track.id();
        tracing::debug!(
            "Added {} track '{}' to '{}'",
            track.track_type().name(),
            track.name(),
            self.name
        );
        self.tracks.push(track);
        id
    }

    /// Add a concrete track; returns its ID
    pub fn add<T: Track>(&mut self, track: T) -> TrackId {
        self.add_track(Box::new(track))
    }

    /// Remove a track
    pub fn remove_track(&mut self, id: TrackId) -> Result<Box<dyn Track>> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| SequencerError::TrackNotFound(id.0.to_string()))?;
        Ok(self.tracks.remove(index))
    }

    /// Get a track
    pub fn track(&self, id: TrackId) -> Option<&dyn Track> {
        self.tracks.iter().find(|t| t.id() == id).map(|t| &**t)
    }

    /// Get a mutable track
    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Box<dyn Track>> {
        self.tracks.iter_mut().find(|t| t.id() == id)
    }

    /// Get a track as its concrete type
    pub fn track_as<T: Track>(&self, id: TrackId) -> Option<&T> {
        self.track(id).and_then(|t| t.as_any().downcast_ref::<T>())
    }

    /// Get a mutable track as its concrete type
    pub fn track_as_mut<T: Track>(&mut self, id: TrackId) -> Option<&mut T> {
        self.track_mut(id)
            .and_then(|t| t.as_any_mut().downcast_mut::<T>())
    }

    /// All tracks in processing order
    pub fn tracks(&self) -> &[Box<dyn Track>] {
        &self.tracks
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn for_each_track(
        &mut self,
        running_time: f32,
        is_playing: bool,
        mut f: impl FnMut(&mut dyn Track, &TrackContext<'_>),
    ) {
        let ctx = TrackContext {
            target: self.target.as_ref(),
            running_time,
            is_playing,
        };
        for track in &mut self.tracks {
            f(track.as_mut(), &ctx);
        }
    }

    /// Fan out the one-time start
    pub fn start_timelines(&mut self, running_time: f32, is_playing: bool) {
        self.for_each_track(running_time, is_playing, |track, ctx| track.start_timeline(ctx));
    }

    /// Fan out resume
    pub fn resume_timelines(&mut self, running_time: f32, is_playing: bool) {
        self.for_each_track(running_time, is_playing, |track, ctx| track.resume_timeline(ctx));
    }

    /// Fan out pause
    pub fn pause_timelines(&mut self, running_time: f32, is_playing: bool) {
        self.for_each_track(running_time, is_playing, |track, ctx| track.pause_timeline(ctx));
    }

    /// Fan out stop. Tracks needing a target only run while it is alive
    pub fn stop_timelines(&mut self, running_time: f32, is_playing: bool) {
        let target_valid = self.has_valid_target();
        self.for_each_track(running_time, is_playing, |track, ctx| {
            if !track.requires_target() || target_valid {
                track.stop_timeline(ctx);
            }
        });
    }

    /// Fan out end with the same target rule as stop
    pub fn end_timelines(&mut self, running_time: f32, is_playing: bool) {
        let target_valid = self.has_valid_target();
        self.for_each_track(running_time, is_playing, |track, ctx| {
            if !track.requires_target() || target_valid {
                track.end_timeline(ctx);
            }
        });
    }

    /// Process every track at `sequence_time`; inactive containers do nothing
    pub fn process_tracks(&mut self, sequence_time: f32, playback_rate: f32, is_playing: bool) {
        if !self.active {
            return;
        }
        self.for_each_track(sequence_time, is_playing, |track, ctx| {
            track.process(ctx, sequence_time, playback_rate);
        });
    }

    /// Jump every track to `time`
    pub fn skip_timeline_to(&mut self, time: f32, running_time: f32, is_playing: bool) {
        self.for_each_track(running_time, is_playing, |track, ctx| {
            track.skip_timeline_to(ctx, time);
        });
    }

    /// Set a preview time on every track
    pub fn manually_set_time(&mut self, time: f32, is_playing: bool) {
        self.for_each_track(time, is_playing, |track, ctx| track.manually_set_time(ctx, time));
    }
}

impl std::fmt::Debug for TrackContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackContainer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("index", &self.index)
            .field("target", &self.target)
            .field("tracks", &self.tracks.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{shared, MemberPath, PropertyBag};
    use crate::event::EventTrack;
    use crate::observer::{CameraRig, ObserverTrack};
    use crate::property::{PropertyInfo, PropertyTrack};
    use crate::value::{PropertyValue, ValueKind};

    #[test]
    fn test_container_named_after_target() {
        let target = shared(PropertyBag::new("Hero"));
        let container = TrackContainer::with_target(&target);
        assert_eq!(container.name, "Timelines for Hero");
        assert!(container.is_bound_to(&target));
        assert!(container.has_valid_target());
    }

    #[test]
    fn test_add_remove_and_downcast() {
        let mut container = TrackContainer::new("Loose");
        let id = container.add(EventTrack::new("Events"));
        assert_eq!(container.track_count(), 1);
        assert!(container.track_as::<EventTrack>(id).is_some());
        assert!(container.track_as::<PropertyTrack>(id).is_none());

        assert!(container.remove_track(id).is_ok());
        assert!(matches!(
            container.remove_track(id),
            Err(SequencerError::TrackNotFound(_))
        ));
    }

    #[test]
    fn test_inactive_container_skips_processing() {
        let path = MemberPath::new("", "value");
        let target = shared(PropertyBag::new("Dial").with(path.clone(), PropertyValue::Float(0.0)));
        let mut container = TrackContainer::with_target(&target);
        let mut track = PropertyTrack::new("Dial");
        track
            .add_property(
                PropertyInfo::new(path.clone(), ValueKind::Float)
                    .with_key(0.0, PropertyValue::Float(4.0))
                    .unwrap(),
            )
            .unwrap();
        container.add(track);

        container.set_active(false);
        container.process_tracks(1.0, 1.0, true);
        assert_eq!(target.borrow().get(&path), Some(PropertyValue::Float(0.0)));

        container.set_active(true);
        container.process_tracks(1.0, 1.0, true);
        assert_eq!(target.borrow().get(&path), Some(PropertyValue::Float(4.0)));
    }

    #[test]
    fn test_stop_reaches_camera_tracks_without_target() {
        let mut rig = CameraRig::new();
        let camera = rig.add_camera("Main", false);
        rig.set_enabled(camera, true);
        let rig = rig.into_shared();

        let mut container = TrackContainer::new("Cameras");
        container.add(ObserverTrack::new("Cuts", rig.clone()));
        container.start_timelines(0.0, true);
        rig.borrow_mut().set_enabled(camera, false);
        container.stop_timelines(0.0, false);
        assert!(rig.borrow().is_enabled(camera));
    }

    #[test]
    fn test_dropped_target_invalidates_container() {
        let target = shared(PropertyBag::new("Ghost"));
        let container = TrackContainer::with_target(&target);
        drop(target);
        assert!(!container.has_valid_target());
    }
}
