// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequence documents: a RON description of targets, cameras and tracks.

use crate::driver::TracingDriver;
use crate::error::{PlayerError, Result};
use cutscene_sequencer::{
    shared, AnimationClipData, AnimationTrack, CameraRig, EventTiming, EventTrack, MemberPath,
    MessageAction, MessageSink, ObjectPathTrack, ObserverKeyframe, ObserverTrack, PropertyBag,
    PropertyInfo, PropertyTrack, PropertyValue, SequenceEvent, Sequencer, SetPropertyAction,
    SharedDriver, SharedRig, SharedTarget, Spline, TrackContainer, TransitionType, DEFAULT_DURATION,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// A whole sequence as authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDocument {
    /// Sequence name
    pub name: String,
    /// Sequence length in seconds
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// Loop at the end
    #[serde(default)]
    pub looping: bool,
    /// Bounce at both ends
    #[serde(default)]
    pub ping_pong: bool,
    /// Objects the tracks animate
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    /// Cameras observer tracks cut between
    #[serde(default)]
    pub cameras: Vec<CameraSpec>,
    /// Track groups
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

fn default_duration() -> f32 {
    DEFAULT_DURATION
}

/// An animatable object and its initial member values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Target name
    pub name: String,
    /// Members keyed by `component.member`
    #[serde(default)]
    pub members: IndexMap<String, PropertyValue>,
}

/// A camera in the rig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    /// Camera name
    pub name: String,
    /// Whether it carries an audio listener
    #[serde(default)]
    pub listener: bool,
    /// Whether it starts enabled
    #[serde(default)]
    pub enabled: bool,
}

/// Tracks sharing one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Target name; camera-only containers have none
    #[serde(default)]
    pub target: Option<String>,
    /// Display name override
    #[serde(default)]
    pub name: Option<String>,
    /// Tracks in processing order
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
}

/// One track of any kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackSpec {
    /// Keyed member values
    Property {
        /// Track name
        name: String,
        /// Animated members
        properties: Vec<PropertySpec>,
    },
    /// Timed events
    Event {
        /// Track name
        name: String,
        /// Events in any order
        events: Vec<EventSpec>,
    },
    /// Camera cuts
    Observer {
        /// Track name
        name: String,
        /// Cuts in any order
        cuts: Vec<CutSpec>,
    },
    /// Movement along a spline
    Path {
        /// Track name
        name: String,
        /// Vector member receiving the position
        member: String,
        /// Spline nodes
        nodes: Vec<[f32; 3]>,
        /// Loop back to the first node
        #[serde(default)]
        closed: bool,
        /// Time the path starts
        start_time: f32,
        /// Time the path ends
        end_time: f32,
    },
    /// Animation clips
    Animation {
        /// Track name
        name: String,
        /// Driver the clips play on
        driver: String,
        /// Clip placements
        clips: Vec<ClipSpec>,
    },
}

/// How keyed tangents are shaped after loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TangentMode {
    /// Zero slope at every key
    #[default]
    Flat,
    /// Slope from the neighbouring keys
    Smooth,
    /// Straight lines between keys
    Linear,
    /// Hold each value until the next key
    Constant,
}

/// One animated member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Member as `component.member`
    pub member: String,
    /// `(time, value)` keys
    pub keys: Vec<(f32, PropertyValue)>,
    /// Tangent shape
    #[serde(default)]
    pub tangents: TangentMode,
}

/// One event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Event name
    pub name: String,
    /// Fire time
    pub fire_time: f32,
    /// Window length; zero or less fires and forgets
    #[serde(default)]
    pub duration: f32,
    /// Fire when skipped past
    #[serde(default)]
    pub fire_on_skip: bool,
    /// What the event does
    #[serde(default)]
    pub action: ActionSpec,
}

/// Built-in event behaviour
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ActionSpec {
    /// Post a message to the player
    #[default]
    Message,
    /// Set a member, restoring it on undo
    SetProperty {
        /// Member as `component.member`
        member: String,
        /// Value to set
        value: PropertyValue,
    },
}

/// One camera switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutSpec {
    /// Switch time
    pub time: f32,
    /// Camera name
    pub camera: String,
    /// How to switch
    #[serde(default)]
    pub transition: TransitionType,
    /// Transition length
    #[serde(default)]
    pub duration: f32,
}

/// One animation clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// State to play
    pub state: String,
    /// Driver layer
    #[serde(default)]
    pub layer: u32,
    /// Clip start
    pub start_time: f32,
    /// Length of one pass through the state
    pub state_duration: f32,
    /// Time on the timeline, defaults to one pass
    #[serde(default)]
    pub playback_duration: Option<f32>,
    /// Blend-in length
    #[serde(default)]
    pub cross_fade: Option<f32>,
}

/// A target owned by the scene, with the members it was declared with
#[derive(Clone)]
pub struct SceneTarget {
    /// Shared handle the sequencer binds to
    pub handle: SharedTarget,
    /// Declared members
    pub members: Vec<MemberPath>,
}

/// Everything a built document owns; dropping it drops the targets
pub struct Scene {
    /// Sequence name
    pub name: String,
    /// The sequencer, with every container added
    pub sequencer: Sequencer,
    /// Targets by name
    pub targets: IndexMap<String, SceneTarget>,
    /// Camera rig
    pub rig: SharedRig,
    /// Messages posted by message events
    pub messages: MessageSink,
    /// Animation drivers by name
    pub drivers: IndexMap<String, Rc<RefCell<TracingDriver>>>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("sequencer", &self.sequencer)
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl SequenceDocument {
    /// Parse a document from RON text
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Load a document from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Build a playable scene
    pub fn build(&self) -> Result<Scene> {
        let mut scene = Scene {
            name: self.name.clone(),
            sequencer: Sequencer::new(self.duration),
            targets: IndexMap::new(),
            rig: CameraRig::new().into_shared(),
            messages: Rc::new(RefCell::new(Vec::new())),
            drivers: IndexMap::new(),
        };
        scene.sequencer.set_looping(self.looping);
        scene.sequencer.set_ping_ponging(self.ping_pong);

        for spec in &self.targets {
            if scene.targets.contains_key(&spec.name) {
                return Err(PlayerError::InvalidDocument(format!(
                    "duplicate target '{}'",
                    spec.name
                )));
            }
            let mut bag = PropertyBag::new(spec.name.clone());
            let mut members = Vec::new();
            for (path, value) in &spec.members {
                let path = MemberPath::parse(path);
                bag.insert(path.clone(), *value);
                members.push(path);
            }
            scene.targets.insert(
                spec.name.clone(),
                SceneTarget {
                    handle: shared(bag),
                    members,
                },
            );
        }

        {
            let mut rig = scene.rig.borrow_mut();
            for spec in &self.cameras {
                let id = rig.add_camera(spec.name.clone(), spec.listener);
                rig.set_enabled(id, spec.enabled);
            }
        }

        for spec in &self.containers {
            let mut container = match &spec.target {
                Some(name) => {
                    let target = scene
                        .targets
                        .get(name)
                        .ok_or_else(|| {
                            PlayerError::InvalidDocument(format!("unknown target '{name}'"))
                        })?;
                    TrackContainer::with_target(&target.handle)
                }
                None => TrackContainer::new("Cameras"),
            };
            if let Some(name) = &spec.name {
                container.name = name.clone();
            }
            for track in &spec.tracks {
                build_track(&mut scene, &mut container, track)?;
            }
            scene.sequencer.add_container(container);
        }

        tracing::info!(
            "Built sequence '{}': {} targets, {} cameras, {} containers",
            self.name,
            scene.targets.len(),
            self.cameras.len(),
            scene.sequencer.containers().len()
        );
        Ok(scene)
    }
}

fn build_track(scene: &mut Scene, container: &mut TrackContainer, spec: &TrackSpec) -> Result<()> {
    match spec {
        TrackSpec::Property { name, properties } => {
            let mut track = PropertyTrack::new(name.clone());
            for property in properties {
                track.add_property(build_property(property)?)?;
            }
            container.add(track);
        }
        TrackSpec::Event { name, events } => {
            let mut track = EventTrack::new(name.clone());
            for event in events {
                let timing = EventTiming {
                    fire_time: event.fire_time,
                    duration: event.duration,
                    fire_on_skip: event.fire_on_skip,
                };
                let event = match &event.action {
                    ActionSpec::Message => SequenceEvent::new(
                        event.name.clone(),
                        timing,
                        MessageAction::new(scene.messages.clone()),
                    ),
                    ActionSpec::SetProperty { member, value } => SequenceEvent::new(
                        event.name.clone(),
                        timing,
                        SetPropertyAction::new(MemberPath::parse(member), *value),
                    ),
                };
                track.add_event(event);
            }
            container.add(track);
        }
        TrackSpec::Observer { name, cuts } => {
            let mut track = ObserverTrack::new(name.clone(), scene.rig.clone());
            for cut in cuts {
                let camera = scene
                    .rig
                    .borrow()
                    .find_by_name(&cut.camera)
                    .ok_or_else(|| {
                        PlayerError::InvalidDocument(format!("unknown camera '{}'", cut.camera))
                    })?;
                let keyframe = match cut.transition {
                    TransitionType::Cut => ObserverKeyframe::cut(cut.time, camera),
                    other => ObserverKeyframe::transition(cut.time, camera, other, cut.duration),
                };
                track.add_keyframe(keyframe);
            }
            container.add(track);
        }
        TrackSpec::Path {
            name,
            member,
            nodes,
            closed,
            start_time,
            end_time,
        } => {
            let mut spline = Spline::new(nodes.clone())?;
            if *closed {
                spline.close()?;
            }
            container.add(ObjectPathTrack::new(
                name.clone(),
                spline,
                MemberPath::parse(member),
                *start_time,
                *end_time,
            ));
        }
        TrackSpec::Animation { name, driver, clips } => {
            let driver = scene
                .drivers
                .entry(driver.clone())
                .or_insert_with(|| Rc::new(RefCell::new(TracingDriver::new(driver.clone()))))
                .clone();
            let driver: SharedDriver = driver;
            let mut track = AnimationTrack::new(name.clone(), &driver);
            for clip in clips {
                let mut data = AnimationClipData::new(
                    clip.state.clone(),
                    clip.start_time,
                    clip.state_duration,
                );
                if let Some(duration) = clip.playback_duration {
                    data = data.with_playback_duration(duration);
                }
                if let Some(fade) = clip.cross_fade {
                    data = data.with_cross_fade(fade);
                }
                track.add_clip(clip.layer, data);
            }
            container.add(track);
        }
    }
    Ok(())
}

fn build_property(spec: &PropertySpec) -> Result<PropertyInfo> {
    let path = MemberPath::parse(&spec.member);
    let Some((_, first)) = spec.keys.first() else {
        return Err(PlayerError::InvalidDocument(format!("property '{path}' has no keys")));
    };

    let mut info = PropertyInfo::new(path, first.kind());
    for (time, value) in &spec.keys {
        info.add_keyframe(*time, *value)?;
    }

    for channel in 0..info.curves().len() {
        let Some(curve) = info.curve_mut(channel) else {
            continue;
        };
        let ids: Vec<_> = curve.keyframes().iter().map(|k| k.id).collect();
        for id in ids {
            match spec.tangents {
                TangentMode::Flat => curve.flatten(id)?,
                TangentMode::Smooth => curve.smooth(id)?,
                TangentMode::Linear => curve.both_tangent_linear(id)?,
                TangentMode::Constant => curve.both_tangent_constant(id)?,
            }
        }
    }
    Ok(info)
}
