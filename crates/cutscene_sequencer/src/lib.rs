// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline playback core for cutscenes.
//!
//! This crate provides the runtime half of a cutscene sequencer:
//! - Keyframed curves with Hermite tangents
//! - Property tracks writing curve values into bound targets
//! - Event tracks with forward fire, undo on rewind and skip semantics
//! - Camera cuts and timed transitions
//! - Object paths along splines
//! - Animation clip timing for an external animation system
//!
//! ## Architecture
//!
//! The sequencer is built on:
//! - A tick-driven clock ([`Sequencer`]) that loops, ping-pongs or finishes
//! - Containers grouping tracks that act on one target
//! - A shared track lifecycle ([`Track`]): start, process, pause, resume, stop, end
//! - Typed binding tables instead of runtime reflection
//!
//! Everything is single-threaded. Targets are owned by the host and held
//! weakly; a dropped target makes its tracks skip silently.

pub mod animation;
pub mod binding;
pub mod container;
pub mod curve;
pub mod error;
pub mod event;
pub mod observer;
pub mod path;
pub mod property;
pub mod sequencer;
pub mod track;
pub mod value;

pub use animation::{AnimationClipData, AnimationDriver, AnimationTrack, ClipLane, SharedDriver};
pub use binding::{
    shared, Accessor, AnimationTarget, BindingTable, Bound, MemberPath, PropertyBag, SharedTarget,
    TargetRef,
};
pub use container::{ContainerId, TrackContainer};
pub use curve::{Curve, Interpolation, Keyframe, KeyframeId};
pub use error::{Result, SequencerError};
pub use event::{
    EventAction, EventContext, EventId, EventMessage, EventState, EventTiming, EventTrack,
    MessageAction, MessageKind, MessageSink, SequenceEvent, SetPropertyAction,
};
pub use observer::{
    CameraId, CameraKeyframeId, CameraRig, CameraState, ObserverKeyframe, ObserverTrack, SharedRig,
    Transition, TransitionType,
};
pub use path::{ObjectPathTrack, Spline, SplineSolver};
pub use property::{PropertyInfo, PropertyTrack};
pub use sequencer::{
    update_rate, ListenerId, PlaybackEvent, PlaybackState, Sequencer, DEFAULT_DURATION,
    MAX_LOOP_WRAPS, MAX_PLAYBACK_RATE, MIN_DURATION, MIN_PLAYBACK_RATE, SEQUENCE_UPDATE_RATE,
};
pub use track::{Track, TrackContext, TrackId, TrackType};
pub use value::{PropertyValue, ValueKind};
