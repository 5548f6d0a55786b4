// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframed float curves.
//!
//! A [`Curve`] keeps its keyframes sorted by time and caches a segment table
//! (the "native" representation) that is rebuilt after every edit. Each
//! segment is a cubic Hermite span; an infinite tangent on either side turns
//! the span into a step that holds the left value.

use crate::error::{Result, SequencerError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A keyframe on a curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Unique keyframe ID
    pub id: KeyframeId,
    /// Time in seconds, never negative
    pub time: f32,
    /// Value at this keyframe
    pub value: f32,
    /// Incoming slope (value per second)
    pub in_tangent: f32,
    /// Outgoing slope (value per second)
    pub out_tangent: f32,
    /// Whether in and out tangents are edited independently
    pub broken_tangents: bool,
}

impl Keyframe {
    /// Create a keyframe with flat tangents
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            id: KeyframeId::new(),
            time: time.max(0.0),
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
            broken_tangents: false,
        }
    }

    /// Set both tangents
    pub fn with_tangents(mut self, in_tangent: f32, out_tangent: f32) -> Self {
        self.in_tangent = in_tangent;
        self.out_tangent = out_tangent;
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Cubic Hermite interpolation with tangents already scaled to the span
    pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }
}

/// One evaluated span between neighbouring keyframes
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: f32,
    end: f32,
    p0: f32,
    p1: f32,
    m0: f32,
    m1: f32,
    step: bool,
}

impl Segment {
    fn between(a: &Keyframe, b: &Keyframe) -> Self {
        let dt = b.time - a.time;
        let step = a.out_tangent.is_infinite() || b.in_tangent.is_infinite() || dt <= 0.0;
        let (m0, m1) = if step {
            (0.0, 0.0)
        } else {
            (a.out_tangent * dt, b.in_tangent * dt)
        };
        Self {
            start: a.time,
            end: b.time,
            p0: a.value,
            p1: b.value,
            m0,
            m1,
            step,
        }
    }

    fn sample(&self, time: f32) -> f32 {
        if self.step {
            return self.p0;
        }
        let s = (time - self.start) / (self.end - self.start);
        Interpolation::hermite(self.p0, self.m0, self.p1, self.m1, s)
    }
}

/// Persisted form of a curve; the segment table is derived on load
#[derive(Serialize, Deserialize)]
struct CurveRecord {
    keyframes: Vec<Keyframe>,
    duration: f32,
}

/// A keyframed float curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CurveRecord", into = "CurveRecord")]
pub struct Curve {
    keyframes: Vec<Keyframe>,
    duration: f32,
    segments: Vec<Segment>,
}

impl From<CurveRecord> for Curve {
    fn from(record: CurveRecord) -> Self {
        let mut keyframes = record.keyframes;
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        keyframes.dedup_by(|later, earlier| {
            let same = later.time == earlier.time;
            if same {
                *earlier = later.clone();
            }
            same
        });
        let last = keyframes.last().map_or(0.0, |k| k.time);
        let mut curve = Self {
            keyframes,
            duration: record.duration.max(last),
            segments: Vec::new(),
        };
        curve.build_from_internal();
        curve
    }
}

impl From<Curve> for CurveRecord {
    fn from(curve: Curve) -> Self {
        Self {
            keyframes: curve.keyframes,
            duration: curve.duration,
        }
    }
}

impl Curve {
    /// Create an empty curve
    pub fn new() -> Self {
        Self {
            keyframes: Vec::new(),
            duration: 0.0,
            segments: Vec::new(),
        }
    }

    /// Create a curve holding a constant value at time 0
    pub fn constant(value: f32) -> Self {
        let mut curve = Self::new();
        curve.add_keyframe(0.0, value);
        curve
    }

    /// Build from `(time, value)` pairs with flat tangents
    pub fn from_points(points: &[(f32, f32)]) -> Self {
        let mut curve = Self::new();
        for &(time, value) in points {
            curve.add_keyframe(time, value);
        }
        curve
    }

    /// Insert a keyframe, keeping time order.
    ///
    /// A keyframe already at exactly `time` is overwritten and its id returned.
    pub fn add_keyframe(&mut self, time: f32, value: f32) -> KeyframeId {
        let time = time.max(0.0);
        if let Some(existing) = self.keyframes.iter_mut().find(|k| k.time == time) {
            existing.value = value;
            let id = existing.id;
            self.build_from_internal();
            return id;
        }

        let keyframe = Keyframe::new(time, value);
        let id = keyframe.id;
        let index = self.keyframes.partition_point(|k| k.time < time);
        self.keyframes.insert(index, keyframe);
        if self.duration < time {
            self.duration = time;
        }
        self.build_from_internal();
        id
    }

    /// Insert a fully specified keyframe (tangents included)
    pub fn insert_keyframe(&mut self, keyframe: Keyframe) -> KeyframeId {
        let mut keyframe = keyframe;
        keyframe.time = keyframe.time.max(0.0);
        let id = keyframe.id;
        self.keyframes.retain(|k| k.time != keyframe.time);
        let index = self.keyframes.partition_point(|k| k.time < keyframe.time);
        if self.duration < keyframe.time {
            self.duration = keyframe.time;
        }
        self.keyframes.insert(index, keyframe);
        self.build_from_internal();
        id
    }

    /// Remove a keyframe
    pub fn remove_keyframe(&mut self, id: KeyframeId) -> Result<Keyframe> {
        let index = self.index_of(id)?;
        let removed = self.keyframes.remove(index);
        self.build_from_internal();
        Ok(removed)
    }

    /// Rebuild the cached segment table from the keyframes
    pub fn build_from_internal(&mut self) {
        self.segments = self
            .keyframes
            .windows(2)
            .map(|pair| Segment::between(&pair[0], &pair[1]))
            .collect();
    }

    /// Evaluate the curve, clamping outside the keyed range
    pub fn evaluate(&self, time: f32) -> f32 {
        let (first, last) = match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let index = self.segments.partition_point(|s| s.end < time);
        match self.segments.get(index) {
            Some(segment) => segment.sample(time),
            None => last.value,
        }
    }

    /// All keyframes, sorted by time
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Number of keyframes
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Get keyframe by ID
    pub fn keyframe(&self, id: KeyframeId) -> Option<&Keyframe> {
        self.keyframes.iter().find(|k| k.id == id)
    }

    fn index_of(&self, id: KeyframeId) -> Result<usize> {
        self.keyframes
            .iter()
            .position(|k| k.id == id)
            .ok_or_else(|| SequencerError::KeyframeNotFound(id.0.to_string()))
    }

    /// Keyframe after `id`, `None` at the end of the curve
    pub fn next_keyframe(&self, id: KeyframeId) -> Option<&Keyframe> {
        let index = self.index_of(id).ok()?;
        self.keyframes.get(index + 1)
    }

    /// Keyframe before `id`, `None` at the start of the curve
    pub fn prev_keyframe(&self, id: KeyframeId) -> Option<&Keyframe> {
        let index = self.index_of(id).ok()?;
        index.checked_sub(1).and_then(|i| self.keyframes.get(i))
    }

    /// Curve length; grows with keyframes, never shrinks on its own
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Set the curve length
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration.max(0.0);
    }

    /// Time of the first keyframe
    pub fn first_keyframe_time(&self) -> Option<f32> {
        self.keyframes.first().map(|k| k.time)
    }

    /// Time of the last keyframe
    pub fn last_keyframe_time(&self) -> Option<f32> {
        self.keyframes.last().map(|k| k.time)
    }

    fn edit<F: FnOnce(&mut Keyframe)>(&mut self, id: KeyframeId, f: F) -> Result<()> {
        let index = self.index_of(id)?;
        f(&mut self.keyframes[index]);
        self.build_from_internal();
        Ok(())
    }

    /// Set a keyframe's value
    pub fn set_keyframe_value(&mut self, id: KeyframeId, value: f32) -> Result<()> {
        self.edit(id, |k| k.value = value)
    }

    /// Move a keyframe in time.
    ///
    /// Time is clamped at zero, the curve is re-sorted, and any other keyframe
    /// already at the new time is replaced.
    pub fn set_keyframe_time(&mut self, id: KeyframeId, time: f32) -> Result<()> {
        let index = self.index_of(id)?;
        let time = time.max(0.0);
        let mut keyframe = self.keyframes.remove(index);
        keyframe.time = time;
        self.insert_keyframe(keyframe);
        Ok(())
    }

    /// Set a keyframe's incoming tangent
    pub fn set_in_tangent(&mut self, id: KeyframeId, tangent: f32) -> Result<()> {
        self.edit(id, |k| k.in_tangent = tangent)
    }

    /// Set a keyframe's outgoing tangent
    pub fn set_out_tangent(&mut self, id: KeyframeId, tangent: f32) -> Result<()> {
        self.edit(id, |k| k.out_tangent = tangent)
    }

    /// Set the broken-tangent flag
    pub fn set_broken_tangents(&mut self, id: KeyframeId, broken: bool) -> Result<()> {
        self.edit(id, |k| k.broken_tangents = broken)
    }

    /// Give the keyframe a continuous tangent following its neighbours
    pub fn smooth(&mut self, id: KeyframeId) -> Result<()> {
        let index = self.index_of(id)?;
        let prev = index.checked_sub(1).and_then(|i| self.keyframes.get(i));
        let next = self.keyframes.get(index + 1);
        let key = &self.keyframes[index];
        let slope = match (prev, next) {
            (Some(p), Some(n)) => (n.value - p.value) / (n.time - p.time),
            (Some(p), None) => (key.value - p.value) / (key.time - p.time),
            (None, Some(n)) => (n.value - key.value) / (n.time - key.time),
            (None, None) => 0.0,
        };
        let slope = if slope.is_finite() { slope } else { 0.0 };
        self.edit(id, |k| {
            k.in_tangent = slope;
            k.out_tangent = slope;
            k.broken_tangents = false;
        })
    }

    /// Zero both tangents
    pub fn flatten(&mut self, id: KeyframeId) -> Result<()> {
        self.edit(id, |k| {
            k.in_tangent = 0.0;
            k.out_tangent = 0.0;
        })
    }

    fn linear_out(&self, index: usize) -> Option<f32> {
        let key = &self.keyframes[index];
        let next = self.keyframes.get(index + 1)?;
        Some((next.value - key.value) / (next.time - key.time))
    }

    fn linear_in(&self, index: usize) -> Option<f32> {
        let key = &self.keyframes[index];
        let prev = self.keyframes.get(index.checked_sub(1)?)?;
        Some((prev.value - key.value) / (prev.time - key.time))
    }

    /// Point the outgoing tangent at the next keyframe. No-op on the last key.
    pub fn right_tangent_linear(&mut self, id: KeyframeId) -> Result<()> {
        let index = self.index_of(id)?;
        if let Some(slope) = self.linear_out(index) {
            self.edit(id, |k| {
                k.out_tangent = slope;
                k.broken_tangents = true;
            })?;
        }
        Ok(())
    }

    /// Point the incoming tangent at the previous keyframe. No-op on the first key.
    pub fn left_tangent_linear(&mut self, id: KeyframeId) -> Result<()> {
        let index = self.index_of(id)?;
        if let Some(slope) = self.linear_in(index) {
            self.edit(id, |k| {
                k.in_tangent = slope;
                k.broken_tangents = true;
            })?;
        }
        Ok(())
    }

    /// Make both tangents linear, rebuilding once
    pub fn both_tangent_linear(&mut self, id: KeyframeId) -> Result<()> {
        let index = self.index_of(id)?;
        let slope_in = self.linear_in(index);
        let slope_out = self.linear_out(index);
        if slope_in.is_none() && slope_out.is_none() {
            return Ok(());
        }
        self.edit(id, |k| {
            if let Some(slope) = slope_in {
                k.in_tangent = slope;
            }
            if let Some(slope) = slope_out {
                k.out_tangent = slope;
            }
            k.broken_tangents = true;
        })
    }

    /// Hold this keyframe's value until the next one
    pub fn right_tangent_constant(&mut self, id: KeyframeId) -> Result<()> {
        self.edit(id, |k| k.out_tangent = f32::INFINITY)
    }

    /// Hold the previous keyframe's value up to this one
    pub fn left_tangent_constant(&mut self, id: KeyframeId) -> Result<()> {
        self.edit(id, |k| k.in_tangent = f32::INFINITY)
    }

    /// Make both tangents constant
    pub fn both_tangent_constant(&mut self, id: KeyframeId) -> Result<()> {
        self.edit(id, |k| {
            k.in_tangent = f32::INFINITY;
            k.out_tangent = f32::INFINITY;
        })
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn is_sorted(curve: &Curve) -> bool {
        curve.keyframes().windows(2).all(|w| w[0].time <= w[1].time)
    }

    #[test]
    fn test_sort_invariant_after_edits() {
        let mut curve = Curve::new();
        let ids: Vec<_> = [5.0, 1.0, 3.0, 0.5, 4.0]
            .iter()
            .map(|&t| curve.add_keyframe(t, t * 2.0))
            .collect();
        assert!(is_sorted(&curve));

        curve.remove_keyframe(ids[2]).unwrap();
        assert!(is_sorted(&curve));

        curve.set_keyframe_time(ids[0], 0.25).unwrap();
        assert!(is_sorted(&curve));
        assert_eq!(curve.keyframes()[0].id, ids[0]);
    }

    #[test]
    fn test_same_time_overwrites() {
        let mut curve = Curve::new();
        let first = curve.add_keyframe(1.0, 10.0);
        let second = curve.add_keyframe(1.0, 20.0);
        assert_eq!(first, second);
        assert_eq!(curve.keyframe_count(), 1);
        assert_eq!(curve.evaluate(1.0), 20.0);
    }

    #[test]
    fn test_negative_time_clamped() {
        let mut curve = Curve::new();
        let id = curve.add_keyframe(-3.0, 1.0);
        assert_eq!(curve.keyframe(id).unwrap().time, 0.0);
    }

    #[test]
    fn test_evaluate_boundaries() {
        let curve = Curve::from_points(&[(1.0, 4.0), (3.0, 8.0)]);
        assert_eq!(curve.evaluate(0.0), 4.0);
        assert_eq!(curve.evaluate(1.0), 4.0);
        assert_eq!(curve.evaluate(3.0), 8.0);
        assert_eq!(curve.evaluate(100.0), 8.0);
        assert_eq!(Curve::new().evaluate(1.0), 0.0);
    }

    #[test]
    fn test_hermite_flat_tangents_is_smoothstep() {
        let curve = Curve::from_points(&[(0.0, 0.0), (10.0, 100.0)]);
        for &t in &[2.5f32, 5.0, 7.5] {
            let s = t / 10.0;
            let expected = 100.0 * (3.0 * s * s - 2.0 * s * s * s);
            assert!(approx(curve.evaluate(t), expected));
        }
        assert!(approx(curve.evaluate(5.0), 50.0));
    }

    #[test]
    fn test_linear_tangents_evaluate_linearly() {
        let mut curve = Curve::from_points(&[(0.0, 0.0), (10.0, 100.0)]);
        let first = curve.keyframes()[0].id;
        let last = curve.keyframes()[1].id;
        curve.right_tangent_linear(first).unwrap();
        curve.left_tangent_linear(last).unwrap();

        assert!(curve.keyframe(first).unwrap().broken_tangents);
        assert!(approx(curve.keyframe(first).unwrap().out_tangent, 10.0));
        assert!(approx(curve.evaluate(2.5), 25.0));
        assert!(approx(curve.evaluate(7.5), 75.0));
    }

    #[test]
    fn test_right_tangent_linear_without_neighbour_is_noop() {
        let mut curve = Curve::from_points(&[(0.0, 0.0), (1.0, 1.0)]);
        let last = curve.keyframes()[1].id;
        curve.right_tangent_linear(last).unwrap();
        let key = curve.keyframe(last).unwrap();
        assert_eq!(key.out_tangent, 0.0);
        assert!(!key.broken_tangents);
    }

    #[test]
    fn test_constant_tangent_holds_value() {
        let mut curve = Curve::from_points(&[(0.0, 1.0), (2.0, 5.0)]);
        let first = curve.keyframes()[0].id;
        curve.right_tangent_constant(first).unwrap();
        assert_eq!(curve.evaluate(1.0), 1.0);
        assert_eq!(curve.evaluate(1.99), 1.0);
        assert_eq!(curve.evaluate(2.0), 5.0);
    }

    #[test]
    fn test_smooth_and_flatten() {
        let mut curve = Curve::from_points(&[(0.0, 0.0), (1.0, 5.0), (2.0, 2.0)]);
        let mid = curve.keyframes()[1].id;
        curve.smooth(mid).unwrap();
        let key = curve.keyframe(mid).unwrap();
        assert!(approx(key.in_tangent, 1.0));
        assert!(approx(key.out_tangent, 1.0));

        curve.flatten(mid).unwrap();
        let key = curve.keyframe(mid).unwrap();
        assert_eq!((key.in_tangent, key.out_tangent), (0.0, 0.0));
    }

    #[test]
    fn test_neighbours() {
        let curve = Curve::from_points(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let keys: Vec<_> = curve.keyframes().iter().map(|k| k.id).collect();
        assert_eq!(curve.next_keyframe(keys[0]).unwrap().id, keys[1]);
        assert_eq!(curve.prev_keyframe(keys[1]).unwrap().id, keys[0]);
        assert!(curve.prev_keyframe(keys[0]).is_none());
        assert!(curve.next_keyframe(keys[2]).is_none());
    }

    #[test]
    fn test_duration_never_shrinks() {
        let mut curve = Curve::new();
        curve.add_keyframe(1.0, 0.0);
        let late = curve.add_keyframe(6.0, 0.0);
        assert_eq!(curve.duration(), 6.0);
        curve.remove_keyframe(late).unwrap();
        assert_eq!(curve.duration(), 6.0);
    }

    #[test]
    fn test_remove_unknown_keyframe() {
        let mut curve = Curve::constant(1.0);
        let err = curve.remove_keyframe(KeyframeId::new()).unwrap_err();
        assert!(matches!(err, SequencerError::KeyframeNotFound(_)));
    }

    #[test]
    fn test_ron_round_trip_rebuilds_segments() {
        let curve = Curve::from_points(&[(0.0, 0.0), (4.0, 8.0)]);
        let text = ron::to_string(&curve).unwrap();
        let loaded: Curve = ron::from_str(&text).unwrap();
        assert!(approx(loaded.evaluate(2.0), curve.evaluate(2.0)));
    }
}
