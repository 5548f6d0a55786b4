// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property animation: curves bound to target members.

use crate::binding::{MemberPath, TargetRef};
use crate::curve::Curve;
use crate::error::{Result, SequencerError};
use crate::track::{Track, TrackContext, TrackId, TrackType};
use crate::value::{PropertyValue, ValueKind};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// One animated member: a curve per value channel plus its base state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyInfo {
    /// Member being animated
    pub path: MemberPath,
    /// Shape of the member
    pub kind: ValueKind,
    curves: Vec<Curve>,
    /// Value before animation started, restored on stop / preview exit
    #[serde(skip)]
    base_state: Option<PropertyValue>,
}

impl PropertyInfo {
    /// Create with empty curves, one per channel of `kind`
    pub fn new(path: MemberPath, kind: ValueKind) -> Self {
        Self {
            path,
            kind,
            curves: vec![Curve::new(); kind.component_count()],
            base_state: None,
        }
    }

    /// Key every channel of `value` at `time`
    pub fn add_keyframe(&mut self, time: f32, value: PropertyValue) -> Result<()> {
        if value.kind() != self.kind {
            return Err(SequencerError::ValueKindMismatch {
                path: self.path.clone(),
                expected: self.kind,
                got: value.kind(),
            });
        }
        for (curve, channel) in self.curves.iter_mut().zip(value.components()) {
            curve.add_keyframe(time, channel);
        }
        Ok(())
    }

    /// Builder-style keying
    pub fn with_key(mut self, time: f32, value: PropertyValue) -> Result<Self> {
        self.add_keyframe(time, value)?;
        Ok(self)
    }

    /// Per-channel curves
    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    /// Mutable access to one channel
    pub fn curve_mut(&mut self, channel: usize) -> Option<&mut Curve> {
        self.curves.get_mut(channel)
    }

    /// Whether any channel has keyframes
    pub fn has_keyframes(&self) -> bool {
        self.curves.iter().any(|c| c.keyframe_count() > 0)
    }

    /// Latest keyed time across all channels
    pub fn duration(&self) -> f32 {
        self.curves.iter().map(Curve::duration).fold(0.0, f32::max)
    }

    /// Evaluated value at `time`
    pub fn value_at(&self, time: f32) -> PropertyValue {
        let channels: Vec<f32> = self.curves.iter().map(|c| c.evaluate(time)).collect();
        PropertyValue::from_components(self.kind, &channels)
    }

    /// Captured base state, if any
    pub fn base_state(&self) -> Option<PropertyValue> {
        self.base_state
    }

    /// Snapshot the member's current value, once
    pub fn store_base_state(&mut self, target: &TargetRef) {
        if self.base_state.is_none() {
            self.base_state = target.get(&self.path);
        }
    }

    /// Write the snapshot back and forget it
    pub fn restore_base_state(&mut self, target: &TargetRef) -> Result<()> {
        if let Some(value) = self.base_state.take() {
            target.set(&self.path, value)?;
        }
        Ok(())
    }

    /// Write the evaluated value to the target. Returns `false` when nothing was written.
    pub fn set_value(&self, target: &TargetRef, time: f32) -> Result<bool> {
        if !self.has_keyframes() {
            return Ok(false);
        }
        target.set(&self.path, self.value_at(time))
    }
}

/// Track animating any number of members of its container's target
#[derive(Debug, Clone)]
pub struct PropertyTrack {
    id: TrackId,
    name: String,
    properties: Vec<PropertyInfo>,
}

impl PropertyTrack {
    /// Create an empty property track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Add an animated member; a member can only be animated once per track
    pub fn add_property(&mut self, property: PropertyInfo) -> Result<()> {
        if self.contains_property(&property.path) {
            return Err(SequencerError::DuplicateProperty(property.path));
        }
        self.properties.push(property);
        Ok(())
    }

    /// Remove an animated member
    pub fn remove_property(&mut self, path: &MemberPath) -> Option<PropertyInfo> {
        let index = self.properties.iter().position(|p| &p.path == path)?;
        Some(self.properties.remove(index))
    }

    /// Whether a member is animated by this track
    pub fn contains_property(&self, path: &MemberPath) -> bool {
        self.properties.iter().any(|p| &p.path == path)
    }

    /// Get an animated member
    pub fn property(&self, path: &MemberPath) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| &p.path == path)
    }

    /// Get a mutable animated member
    pub fn property_mut(&mut self, path: &MemberPath) -> Option<&mut PropertyInfo> {
        self.properties.iter_mut().find(|p| &p.path == path)
    }

    /// All animated members
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    /// Remove every animated member
    pub fn clear_properties(&mut self) {
        self.properties.clear();
    }

    /// Enter preview: snapshot base state of every member
    pub fn begin_preview(&mut self, target: &TargetRef) {
        for property in &mut self.properties {
            property.store_base_state(target);
        }
    }

    /// Leave preview: restore every snapshot
    pub fn end_preview(&mut self, target: &TargetRef) {
        for property in &mut self.properties {
            if let Err(e) = property.restore_base_state(target) {
                tracing::warn!("Failed to restore {}: {}", property.path, e);
            }
        }
    }

    fn apply(&self, target: &TargetRef, time: f32) {
        for property in &self.properties {
            if let Err(e) = property.set_value(target, time) {
                tracing::warn!("Skipping {} on track '{}': {}", property.path, self.name, e);
            }
        }
    }
}

impl Track for PropertyTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn track_type(&self) -> TrackType {
        TrackType::Property
    }

    fn start_timeline(&mut self, ctx: &TrackContext<'_>) {
        if let Some(target) = ctx.live_target() {
            self.begin_preview(target);
        }
    }

    fn process(&mut self, ctx: &TrackContext<'_>, sequence_time: f32, _playback_rate: f32) {
        let Some(target) = ctx.live_target() else {
            return;
        };
        self.apply(target, sequence_time);
    }

    fn stop_timeline(&mut self, ctx: &TrackContext<'_>) {
        if let Some(target) = ctx.live_target() {
            self.end_preview(target);
        }
    }

    fn manually_set_time(&mut self, ctx: &TrackContext<'_>, time: f32) {
        if let Some(target) = ctx.live_target() {
            self.apply(target, time);
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
    use crate::binding::{shared, PropertyBag, SharedTarget};

    fn target() -> (SharedTarget, TargetRef) {
        let bag = PropertyBag::new("Cube")
            .with(MemberPath::new("Transform", "position"), PropertyValue::Vec3([0.0; 3]))
            .with(MemberPath::new("Light", "intensity"), PropertyValue::Float(7.0));
        let target = shared(bag);
        let handle = TargetRef::new(&target);
        (target, handle)
    }

    #[test]
    fn test_vector_property_evaluates_per_channel() {
        let path = MemberPath::new("Transform", "position");
        let info = PropertyInfo::new(path, ValueKind::Vec3)
            .with_key(0.0, PropertyValue::Vec3([0.0, 0.0, 0.0]))
            .unwrap()
            .with_key(2.0, PropertyValue::Vec3([2.0, 4.0, 6.0]))
            .unwrap();
        assert_eq!(info.curves().len(), 3);
        assert_eq!(info.value_at(2.0), PropertyValue::Vec3([2.0, 4.0, 6.0]));
        assert_eq!(info.value_at(1.0), PropertyValue::Vec3([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_wrong_kind_key_rejected() {
        let mut info = PropertyInfo::new(MemberPath::new("Light", "intensity"), ValueKind::Float);
        let err = info.add_keyframe(0.0, PropertyValue::Bool(true)).unwrap_err();
        assert!(matches!(err, SequencerError::ValueKindMismatch { .. }));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let path = MemberPath::new("Light", "intensity");
        let mut track = PropertyTrack::new("Light");
        track.add_property(PropertyInfo::new(path.clone(), ValueKind::Float)).unwrap();
        let err = track
            .add_property(PropertyInfo::new(path.clone(), ValueKind::Float))
            .unwrap_err();
        assert!(matches!(err, SequencerError::DuplicateProperty(_)));
        assert_eq!(track.properties().len(), 1);

        assert!(track.remove_property(&path).is_some());
        assert!(!track.contains_property(&path));
    }

    #[test]
    fn test_process_writes_and_stop_restores() {
        let (target, handle) = target();
        let path = MemberPath::new("Light", "intensity");
        let mut track = PropertyTrack::new("Light");
        track
            .add_property(
                PropertyInfo::new(path.clone(), ValueKind::Float)
                    .with_key(0.0, PropertyValue::Float(0.0))
                    .unwrap()
                    .with_key(1.0, PropertyValue::Float(1.0))
                    .unwrap(),
            )
            .unwrap();

        let ctx = TrackContext {
            target: Some(&handle),
            running_time: 0.0,
            is_playing: true,
        };
        track.start_timeline(&ctx);
        track.process(&ctx, 1.0, 1.0);
        assert_eq!(target.borrow().get(&path), Some(PropertyValue::Float(1.0)));

        track.stop_timeline(&ctx);
        assert_eq!(target.borrow().get(&path), Some(PropertyValue::Float(7.0)));
    }

    #[test]
    fn test_unknown_member_does_not_block_siblings() {
        let (target, handle) = target();
        let good = MemberPath::new("Light", "intensity");
        let mut track = PropertyTrack::new("Mixed");
        track
            .add_property(
                PropertyInfo::new(MemberPath::new("Light", "range"), ValueKind::Float)
                    .with_key(0.0, PropertyValue::Float(3.0))
                    .unwrap(),
            )
            .unwrap();
        track
            .add_property(
                PropertyInfo::new(good.clone(), ValueKind::Float)
                    .with_key(0.0, PropertyValue::Float(2.0))
                    .unwrap(),
            )
            .unwrap();

        let ctx = TrackContext {
            target: Some(&handle),
            running_time: 0.0,
            is_playing: true,
        };
        track.process(&ctx, 0.5, 1.0);
        assert_eq!(target.borrow().get(&good), Some(PropertyValue::Float(2.0)));
    }

    #[test]
    fn test_dropped_target_is_skipped() {
        let (target, handle) = target();
        let mut track = PropertyTrack::new("Light");
        track
            .add_property(
                PropertyInfo::new(MemberPath::new("Light", "intensity"), ValueKind::Float)
                    .with_key(0.0, PropertyValue::Float(1.0))
                    .unwrap(),
            )
            .unwrap();
        drop(target);

        let ctx = TrackContext {
            target: Some(&handle),
            running_time: 0.0,
            is_playing: true,
        };
        track.process(&ctx, 0.0, 1.0);
        track.stop_timeline(&ctx);
    }
}
