// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera cuts and timed transitions.
//!
//! Only the timing and enabled-flag bookkeeping lives here. Compositing the
//! two cameras during a transition is left to the host, which reads
//! [`Transition::ratio`] and [`Transition::is_blending`].

use crate::error::{Result, SequencerError};
use crate::track::{Track, TrackContext, TrackId, TrackType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for a camera in a rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraId(pub Uuid);

impl CameraId {
    /// Create a new random camera ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CameraId {
    fn default() -> Self {
        Self::new()
    }
}

/// Flags the sequencer toggles on a camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraState {
    /// Camera name
    pub name: String,
    /// Whether the camera renders
    pub enabled: bool,
    /// Whether the camera carries an audio listener
    pub has_listener: bool,
    /// Whether its audio listener is active
    pub listener_enabled: bool,
}

/// Enabled flags of every camera at one moment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RigSnapshot {
    flags: Vec<(CameraId, bool, bool)>,
}

/// The cameras a sequence can cut between
#[derive(Debug, Clone, Default)]
pub struct CameraRig {
    cameras: IndexMap<CameraId, CameraState>,
}

/// Camera rig shared between the host and observer tracks
pub type SharedRig = Rc<RefCell<CameraRig>>;

impl CameraRig {
    /// Create an empty rig
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the rig for sharing
    pub fn into_shared(self) -> SharedRig {
        Rc::new(RefCell::new(self))
    }

    /// Add a disabled camera
    pub fn add_camera(&mut self, name: impl Into<String>, has_listener: bool) -> CameraId {
        let id = CameraId::new();
        self.cameras.insert(
            id,
            CameraState {
                name: name.into(),
                enabled: false,
                has_listener,
                listener_enabled: false,
            },
        );
        id
    }

    /// Get a camera
    pub fn camera(&self, id: CameraId) -> Option<&CameraState> {
        self.cameras.get(&id)
    }

    /// All cameras in insertion order
    pub fn cameras(&self) -> impl Iterator<Item = (CameraId, &CameraState)> {
        self.cameras.iter().map(|(id, state)| (*id, state))
    }

    /// Find a camera by name
    pub fn find_by_name(&self, name: &str) -> Option<CameraId> {
        self.cameras
            .iter()
            .find(|(_, state)| state.name == name)
            .map(|(id, _)| *id)
    }

    /// Enable or disable a camera; unknown ids are ignored
    pub fn set_enabled(&mut self, id: CameraId, enabled: bool) {
        if let Some(camera) = self.cameras.get_mut(&id) {
            camera.enabled = enabled;
        }
    }

    /// Whether a camera is enabled
    pub fn is_enabled(&self, id: CameraId) -> bool {
        self.cameras.get(&id).is_some_and(|c| c.enabled)
    }

    /// Enable or disable a camera's listener, if it has one
    pub fn set_listener_enabled(&mut self, id: CameraId, enabled: bool) {
        if let Some(camera) = self.cameras.get_mut(&id) {
            if camera.has_listener {
                camera.listener_enabled = enabled;
            }
        }
    }

    /// Whether a camera's listener is active
    pub fn is_listener_enabled(&self, id: CameraId) -> bool {
        self.cameras.get(&id).is_some_and(|c| c.listener_enabled)
    }

    /// Cameras currently enabled
    pub fn enabled_cameras(&self) -> Vec<CameraId> {
        self.cameras
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Capture every camera's flags
    pub fn snapshot(&self) -> RigSnapshot {
        RigSnapshot {
            flags: self
                .cameras
                .iter()
                .map(|(id, c)| (*id, c.enabled, c.listener_enabled))
                .collect(),
        }
    }

    /// Put captured flags back
    pub fn restore(&mut self, snapshot: &RigSnapshot) {
        for (id, enabled, listener_enabled) in &snapshot.flags {
            if let Some(camera) = self.cameras.get_mut(id) {
                camera.enabled = *enabled;
                camera.listener_enabled = *listener_enabled;
            }
        }
    }
}

/// How one camera hands over to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransitionType {
    /// Instant switch
    #[default]
    Cut,
    /// Cross dissolve
    Dissolve,
    /// Fade through black
    Fade,
    /// Wipe across the screen
    Wipe,
}

/// Timing state of a running camera transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    transition_type: TransitionType,
    source: CameraId,
    destination: CameraId,
    additional_sources: Vec<CameraId>,
    additional_destinations: Vec<CameraId>,
    previous: Vec<(CameraId, bool)>,
    ratio: f32,
    blending: bool,
}

impl Transition {
    /// Start a transition, remembering the flags it will touch
    pub fn initialize(
        rig: &CameraRig,
        transition_type: TransitionType,
        source: CameraId,
        destination: CameraId,
        additional_sources: &[CameraId],
        additional_destinations: &[CameraId],
    ) -> Self {
        let previous = [source, destination]
            .iter()
            .chain(additional_sources)
            .chain(additional_destinations)
            .map(|id| (*id, rig.is_enabled(*id)))
            .collect();
        Self {
            transition_type,
            source,
            destination,
            additional_sources: additional_sources.to_vec(),
            additional_destinations: additional_destinations.to_vec(),
            previous,
            ratio: 1.0,
            blending: false,
        }
    }

    /// Transition type
    pub fn transition_type(&self) -> TransitionType {
        self.transition_type
    }

    /// Camera being left
    pub fn source(&self) -> CameraId {
        self.source
    }

    /// Camera being entered
    pub fn destination(&self) -> CameraId {
        self.destination
    }

    /// Weight of the source camera: 1 at the start, 0 at the end
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Whether the host should composite both cameras
    pub fn is_blending(&self) -> bool {
        self.blending
    }

    /// Set the ratio from the elapsed time without touching camera flags
    pub fn set_elapsed(&mut self, elapsed: f32, duration: f32) {
        self.ratio = if duration > 0.0 {
            (1.0 - elapsed / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Advance the blend; both cameras are handed to the compositor
    pub fn process(&mut self, rig: &mut CameraRig, elapsed: f32, duration: f32) {
        rig.set_enabled(self.source, false);
        rig.set_enabled(self.destination, false);
        self.set_elapsed(elapsed, duration);
        self.blending = true;
    }

    /// Finish on the destination camera
    pub fn complete(&mut self, rig: &mut CameraRig) {
        self.blending = false;
        self.ratio = 0.0;
        rig.set_enabled(self.destination, true);
        rig.set_enabled(self.source, false);
        rig.set_listener_enabled(self.source, false);
        for id in &self.additional_sources {
            rig.set_enabled(*id, false);
        }
        for id in &self.additional_destinations {
            rig.set_enabled(*id, true);
        }
    }

    /// Put every touched camera back the way it was before the transition
    pub fn revert(&mut self, rig: &mut CameraRig) {
        self.blending = false;
        for (id, enabled) in &self.previous {
            rig.set_enabled(*id, *enabled);
        }
    }
}

/// A camera switch at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverKeyframe {
    /// Unique ID
    #[serde(default)]
    pub id: CameraKeyframeId,
    /// Time of the switch
    pub fire_time: f32,
    /// Camera to switch to
    pub camera: Option<CameraId>,
    /// How to switch
    #[serde(default)]
    pub transition_type: TransitionType,
    #[serde(default)]
    transition_duration: f32,
    /// Extra cameras faded out with the source
    #[serde(default)]
    pub additional_source_cameras: Vec<CameraId>,
    /// Extra cameras faded in with the destination
    #[serde(default)]
    pub additional_destination_cameras: Vec<CameraId>,
    #[serde(skip)]
    fired: bool,
    #[serde(skip)]
    transition: Option<Transition>,
}

/// Unique identifier for an observer keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraKeyframeId(pub Uuid);

impl CameraKeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CameraKeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverKeyframe {
    /// A cut to `camera` at `fire_time`
    pub fn cut(fire_time: f32, camera: CameraId) -> Self {
        Self {
            id: CameraKeyframeId::new(),
            fire_time: fire_time.max(0.0),
            camera: Some(camera),
            transition_type: TransitionType::Cut,
            transition_duration: 0.0,
            additional_source_cameras: Vec::new(),
            additional_destination_cameras: Vec::new(),
            fired: false,
            transition: None,
        }
    }

    /// A timed transition to `camera`
    pub fn transition(
        fire_time: f32,
        camera: CameraId,
        transition_type: TransitionType,
        duration: f32,
    ) -> Self {
        Self {
            transition_type,
            transition_duration: duration.max(0.0),
            ..Self::cut(fire_time, camera)
        }
    }

    /// Transition length; always zero for a cut
    pub fn transition_duration(&self) -> f32 {
        match self.transition_type {
            TransitionType::Cut => 0.0,
            _ => self.transition_duration,
        }
    }

    /// Set the transition length
    pub fn set_transition_duration(&mut self, duration: f32) {
        self.transition_duration = duration.max(0.0);
    }

    /// Whether the keyframe is currently fired
    pub fn is_fired(&self) -> bool {
        self.fired
    }

    /// The running transition, if any
    pub fn active_transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    /// Switch to this keyframe's camera; `elapsed` is time since the fire time
    pub fn fire(&mut self, rig: &mut CameraRig, previous_camera: Option<CameraId>, elapsed: f32) {
        self.fired = true;

        if self.transition_type != TransitionType::Cut {
            match (previous_camera, self.camera) {
                (Some(source), Some(destination)) => {
                    let mut transition = Transition::initialize(
                        rig,
                        self.transition_type,
                        source,
                        destination,
                        &self.additional_source_cameras,
                        &self.additional_destination_cameras,
                    );
                    transition.set_elapsed(elapsed, self.transition_duration());
                    self.transition = Some(transition);
                }
                _ => {
                    tracing::warn!("Cannot use a transition as the first cut in a sequence");
                }
            }
        }

        if let Some(camera) = self.camera {
            if self.transition.is_none() {
                rig.set_enabled(camera, true);
            }
            rig.set_listener_enabled(camera, true);
        }
    }

    /// Advance the transition; a cut or an elapsed window does nothing
    pub fn process(&mut self, rig: &mut CameraRig, elapsed: f32) {
        if self.transition_type == TransitionType::Cut {
            return;
        }
        let duration = self.transition_duration();
        if elapsed > duration {
            return;
        }
        if let Some(transition) = &mut self.transition {
            transition.process(rig, elapsed, duration);
        }
        self.fired = true;
    }

    /// Complete the running transition, keeping the keyframe fired
    pub fn finish_transition(&mut self, rig: &mut CameraRig) {
        if let Some(mut transition) = self.transition.take() {
            transition.complete(rig);
        }
    }

    /// Hand over to the next keyframe
    pub fn end(&mut self, rig: &mut CameraRig) {
        self.fired = false;
        self.finish_transition(rig);
    }

    /// Undo the switch
    pub fn revert(&mut self, rig: &mut CameraRig) {
        self.fired = false;
        if let Some(mut transition) = self.transition.take() {
            transition.revert(rig);
        }
        if let Some(camera) = self.camera {
            rig.set_enabled(camera, false);
            rig.set_listener_enabled(camera, false);
        }
    }
}

/// Track switching cameras on a shared rig
#[derive(Debug)]
pub struct ObserverTrack {
    id: TrackId,
    name: String,
    rig: SharedRig,
    keyframes: Vec<ObserverKeyframe>,
    active: Option<usize>,
    snapshot: Option<RigSnapshot>,
}

impl ObserverTrack {
    /// Create a track on `rig`
    pub fn new(name: impl Into<String>, rig: SharedRig) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            rig,
            keyframes: Vec::new(),
            active: None,
            snapshot: None,
        }
    }

    /// The rig this track drives
    pub fn rig(&self) -> &SharedRig {
        &self.rig
    }

    /// Add a keyframe, keeping fire-time order
    pub fn add_keyframe(&mut self, keyframe: ObserverKeyframe) -> CameraKeyframeId {
        let id = keyframe.id;
        let index = self
            .keyframes
            .partition_point(|k| k.fire_time <= keyframe.fire_time);
        self.keyframes.insert(index, keyframe);
        self.active = None;
        id
    }

    /// Remove a keyframe
    pub fn remove_keyframe(&mut self, id: CameraKeyframeId) -> Result<ObserverKeyframe> {
        let index = self
            .keyframes
            .iter()
            .position(|k| k.id == id)
            .ok_or_else(|| SequencerError::KeyframeNotFound(id.0.to_string()))?;
        self.active = None;
        Ok(self.keyframes.remove(index))
    }

    /// Keyframes in fire-time order
    pub fn keyframes(&self) -> &[ObserverKeyframe] {
        &self.keyframes
    }

    /// Keyframe currently in charge
    pub fn active_keyframe(&self) -> Option<&ObserverKeyframe> {
        self.active.and_then(|i| self.keyframes.get(i))
    }

    /// Camera of the keyframe currently in charge
    pub fn current_camera(&self) -> Option<CameraId> {
        self.active_keyframe().and_then(|k| k.camera)
    }

    fn keyframe_index_at(&self, time: f32) -> Option<usize> {
        self.keyframes.iter().rposition(|k| k.fire_time <= time)
    }

    fn previous_camera(&self, index: usize) -> Option<CameraId> {
        index
            .checked_sub(1)
            .and_then(|i| self.keyframes.get(i))
            .and_then(|k| k.camera)
    }
}

impl Track for ObserverTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn track_type(&self) -> TrackType {
        TrackType::Observer
    }

    fn requires_target(&self) -> bool {
        false
    }

    fn start_timeline(&mut self, _ctx: &TrackContext<'_>) {
        let rig = Rc::clone(&self.rig);
        let mut rig = rig.borrow_mut();
        self.snapshot = Some(rig.snapshot());
        for keyframe in &self.keyframes {
            if let Some(camera) = keyframe.camera {
                rig.set_enabled(camera, false);
                rig.set_listener_enabled(camera, false);
            }
        }
        self.active = None;
    }

    fn process(&mut self, _ctx: &TrackContext<'_>, sequence_time: f32, _playback_rate: f32) {
        let rig = Rc::clone(&self.rig);
        let mut rig = rig.borrow_mut();
        let target = self.keyframe_index_at(sequence_time);

        if target != self.active {
            match (self.active, target) {
                (Some(current), Some(next)) if next > current => {
                    let previous_camera = self.keyframes[current].camera;
                    self.keyframes[current].end(&mut rig);
                    let elapsed = sequence_time - self.keyframes[next].fire_time;
                    let keyframe = &mut self.keyframes[next];
                    keyframe.fire(&mut rig, previous_camera, elapsed);
                    if keyframe.active_transition().is_none() {
                        let replaced = previous_camera.filter(|p| Some(*p) != keyframe.camera);
                        if let Some(previous) = replaced {
                            rig.set_enabled(previous, false);
                            rig.set_listener_enabled(previous, false);
                        }
                    }
                    tracing::debug!(
                        "Observer '{}' moved to keyframe at {}",
                        self.name,
                        keyframe.fire_time
                    );
                }
                (None, Some(next)) => {
                    let previous_camera = self.previous_camera(next);
                    let elapsed = sequence_time - self.keyframes[next].fire_time;
                    self.keyframes[next].fire(&mut rig, previous_camera, elapsed);
                }
                (Some(current), next) => {
                    self.keyframes[current].revert(&mut rig);
                    if let Some(next) = next {
                        let previous_camera = self.previous_camera(next);
                        let elapsed = sequence_time - self.keyframes[next].fire_time;
                        let keyframe = &mut self.keyframes[next];
                        keyframe.revert(&mut rig);
                        keyframe.fire(&mut rig, previous_camera, elapsed);
                    }
                    tracing::debug!("Observer '{}' rewound to {}", self.name, sequence_time);
                }
                (None, None) => {}
            }
            self.active = target;
        }

        if let Some(index) = self.active {
            let keyframe = &mut self.keyframes[index];
            let elapsed = sequence_time - keyframe.fire_time;
            keyframe.process(&mut rig, elapsed);
            if keyframe.active_transition().is_some() && elapsed >= keyframe.transition_duration() {
                keyframe.finish_transition(&mut rig);
            }
        }
    }

    fn stop_timeline(&mut self, _ctx: &TrackContext<'_>) {
        let rig = Rc::clone(&self.rig);
        let mut rig = rig.borrow_mut();
        for keyframe in self.keyframes.iter_mut().rev() {
            if keyframe.is_fired() || keyframe.active_transition().is_some() {
                keyframe.revert(&mut rig);
            }
        }
        if let Some(snapshot) = self.snapshot.take() {
            rig.restore(&snapshot);
        }
        self.active = None;
    }

    fn end_timeline(&mut self, _ctx: &TrackContext<'_>) {
        if let Some(index) = self.active {
            let rig = Rc::clone(&self.rig);
            self.keyframes[index].finish_transition(&mut rig.borrow_mut());
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

    fn ctx() -> TrackContext<'static> {
        TrackContext::detached(0.0, true)
    }

    fn rig() -> (SharedRig, CameraId, CameraId) {
        let mut rig = CameraRig::new();
        let a = rig.add_camera("Wide", true);
        let b = rig.add_camera("Close", true);
        rig.set_enabled(a, true);
        rig.set_enabled(b, true);
        (rig.into_shared(), a, b)
    }

    #[test]
    fn test_cut_sequence_forward_and_back() {
        let (rig, a, b) = rig();
        let mut track = ObserverTrack::new("Cameras", rig.clone());
        track.add_keyframe(ObserverKeyframe::cut(0.0, a));
        track.add_keyframe(ObserverKeyframe::cut(2.0, b));

        track.start_timeline(&ctx());
        track.process(&ctx(), 0.5, 1.0);
        assert!(rig.borrow().is_enabled(a));
        assert!(!rig.borrow().is_enabled(b));
        assert!(rig.borrow().is_listener_enabled(a));

        track.process(&ctx(), 2.5, 1.0);
        assert!(!rig.borrow().is_enabled(a));
        assert!(rig.borrow().is_enabled(b));
        assert!(!rig.borrow().is_listener_enabled(a));
        assert!(rig.borrow().is_listener_enabled(b));
        assert_eq!(track.current_camera(), Some(b));

        track.process(&ctx(), 1.0, 1.0);
        assert!(rig.borrow().is_enabled(a));
        assert!(!rig.borrow().is_enabled(b));
        assert_eq!(track.current_camera(), Some(a));
    }

    #[test]
    fn test_dissolve_blends_then_completes() {
        let (rig, a, b) = rig();
        let mut track = ObserverTrack::new("Cameras", rig.clone());
        track.add_keyframe(ObserverKeyframe::cut(0.0, a));
        track.add_keyframe(ObserverKeyframe::transition(2.0, b, TransitionType::Dissolve, 1.0));

        track.start_timeline(&ctx());
        track.process(&ctx(), 0.5, 1.0);
        track.process(&ctx(), 2.5, 1.0);

        let transition = track.active_keyframe().and_then(|k| k.active_transition()).cloned();
        let transition = transition.expect("transition running");
        assert!((transition.ratio() - 0.5).abs() < 1e-6);
        assert!(transition.is_blending());
        assert!(!rig.borrow().is_enabled(a));
        assert!(!rig.borrow().is_enabled(b));

        track.process(&ctx(), 3.5, 1.0);
        assert!(track.active_keyframe().and_then(|k| k.active_transition()).is_none());
        assert!(!rig.borrow().is_enabled(a));
        assert!(rig.borrow().is_enabled(b));
    }

    #[test]
    fn test_first_transition_falls_back_to_cut() {
        let (rig, _a, b) = rig();
        let mut track = ObserverTrack::new("Cameras", rig.clone());
        track.add_keyframe(ObserverKeyframe::transition(0.0, b, TransitionType::Fade, 1.0));

        track.start_timeline(&ctx());
        track.process(&ctx(), 0.1, 1.0);
        assert!(track.active_keyframe().and_then(|k| k.active_transition()).is_none());
        assert!(rig.borrow().is_enabled(b));
    }

    #[test]
    fn test_stop_restores_snapshot() {
        let (rig, a, b) = rig();
        let mut track = ObserverTrack::new("Cameras", rig.clone());
        track.add_keyframe(ObserverKeyframe::cut(0.0, a));
        track.add_keyframe(ObserverKeyframe::cut(1.0, b));
        let before = rig.borrow().snapshot();

        track.start_timeline(&ctx());
        track.process(&ctx(), 1.5, 1.0);
        track.stop_timeline(&ctx());

        assert_eq!(rig.borrow().snapshot(), before);
        assert!(track.keyframes().iter().all(|k| !k.is_fired()));
        assert!(track.active_keyframe().is_none());
    }

    #[test]
    fn test_end_finishes_running_transition() {
        let (rig, a, b) = rig();
        let mut track = ObserverTrack::new("Cameras", rig.clone());
        track.add_keyframe(ObserverKeyframe::cut(0.0, a));
        track.add_keyframe(ObserverKeyframe::transition(1.0, b, TransitionType::Wipe, 2.0));

        track.start_timeline(&ctx());
        track.process(&ctx(), 0.5, 1.0);
        track.process(&ctx(), 1.5, 1.0);
        track.end_timeline(&ctx());
        assert!(rig.borrow().is_enabled(b));
        assert!(!rig.borrow().is_enabled(a));
    }

    #[test]
    fn test_cut_has_no_duration() {
        let mut keyframe = ObserverKeyframe::cut(0.0, CameraId::new());
        keyframe.set_transition_duration(3.0);
        assert_eq!(keyframe.transition_duration(), 0.0);
        keyframe.transition_type = TransitionType::Dissolve;
        assert_eq!(keyframe.transition_duration(), 3.0);
    }

    #[test]
    fn test_observer_needs_no_target() {
        let (rig, _, _) = rig();
        let track = ObserverTrack::new("Cameras", rig);
        assert!(!track.requires_target());
        assert_eq!(track.track_type(), TrackType::Observer);
    }

    #[test]
    fn test_rig_lookup_by_name() {
        let (rig, a, _) = rig();
        assert_eq!(rig.borrow().find_by_name("Wide"), Some(a));
        assert!(rig.borrow().find_by_name("Crane").is_none());
    }
}
