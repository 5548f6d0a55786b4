// SPDX-License-Identifier: MIT OR Apache-2.0
//! Splines and the track that moves a target along one.

use crate::binding::{MemberPath, TargetRef};
use crate::error::{Result, SequencerError};
use crate::track::{Track, TrackContext, TrackId, TrackType};
use crate::value::PropertyValue;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Interpolation scheme picked from the node count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplineSolver {
    /// Two nodes, straight line
    Linear,
    /// Three nodes, quadratic Bezier through the middle node as control
    Quadratic,
    /// Four or more nodes, Catmull-Rom through every node
    CatmullRom,
}

/// A path through a list of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spline {
    nodes: Vec<[f32; 3]>,
    #[serde(default)]
    closed: bool,
}

impl Spline {
    /// Build from at least two nodes
    pub fn new(nodes: Vec<[f32; 3]>) -> Result<Self> {
        if nodes.len() < 2 {
            return Err(SequencerError::InvalidSpline(format!(
                "need at least 2 nodes, got {}",
                nodes.len()
            )));
        }
        Ok(Self { nodes, closed: false })
    }

    /// Nodes the path passes through
    pub fn nodes(&self) -> &[[f32; 3]] {
        &self.nodes
    }

    /// Solver used for this node count
    pub fn solver(&self) -> SplineSolver {
        match self.nodes.len() {
            0..=2 => SplineSolver::Linear,
            3 => SplineSolver::Quadratic,
            _ => SplineSolver::CatmullRom,
        }
    }

    /// Whether the path loops back to its first node
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Loop the path back to its first node; only Catmull-Rom paths can close
    pub fn close(&mut self) -> Result<()> {
        if self.solver() != SplineSolver::CatmullRom {
            return Err(SequencerError::InvalidSpline(
                "only paths with 4 or more nodes can be closed".to_string(),
            ));
        }
        self.closed = true;
        Ok(())
    }

    fn control_points(&self) -> Vec<Vec3> {
        let mut points: Vec<Vec3> = self.nodes.iter().copied().map(Vec3::from).collect();
        let n = points.len();
        if self.closed {
            if points[0] != points[n - 1] {
                points.push(points[0]);
            }
            let m = points.len();
            let before = points[m - 2];
            let after = points[1];
            points.insert(0, before);
            points.push(after);
        } else {
            let start = points[0] * 2.0 - points[1];
            let end = points[n - 1] * 2.0 - points[n - 2];
            points.insert(0, start);
            points.push(end);
        }
        points
    }

    /// Position at normalized progress `t`, clamped to `[0, 1]`
    pub fn position_at(&self, t: f32) -> [f32; 3] {
        // Deserialized splines skip the node count check
        match self.nodes.as_slice() {
            [] => return [0.0; 3],
            [only] => return *only,
            _ => {}
        }
        let t = t.clamp(0.0, 1.0);
        let p = |i: usize| Vec3::from(self.nodes[i]);
        let position = match self.solver() {
            SplineSolver::Linear => p(0).lerp(p(1), t),
            SplineSolver::Quadratic => {
                let d = 1.0 - t;
                p(0) * (d * d) + p(1) * (2.0 * d * t) + p(2) * (t * t)
            }
            SplineSolver::CatmullRom => {
                let points = self.control_points();
                let sections = points.len() - 3;
                let scaled = t * sections as f32;
                let current = (scaled.floor() as usize).min(sections - 1);
                let u = scaled - current as f32;
                catmull_rom(
                    points[current],
                    points[current + 1],
                    points[current + 2],
                    points[current + 3],
                    u,
                )
            }
        };
        position.to_array()
    }

    /// Approximate arc length from `samples` straight pieces
    pub fn sample_length(&self, samples: usize) -> f32 {
        let samples = samples.max(1);
        let mut last = Vec3::from(self.position_at(0.0));
        let mut length = 0.0;
        for i in 1..=samples {
            let next = Vec3::from(self.position_at(i as f32 / samples as f32));
            length += last.distance(next);
            last = next;
        }
        length
    }
}

fn catmull_rom(a: Vec3, b: Vec3, c: Vec3, d: Vec3, u: f32) -> Vec3 {
    0.5 * ((-a + 3.0 * b - 3.0 * c + d) * (u * u * u)
        + (2.0 * a - 5.0 * b + 4.0 * c - d) * (u * u)
        + (-a + c) * u
        + 2.0 * b)
}

/// Moves a vector member of the target along a spline between two times
#[derive(Debug, Clone)]
pub struct ObjectPathTrack {
    id: TrackId,
    name: String,
    /// Path followed
    pub spline: Spline,
    /// Time the target leaves the first node
    pub start_time: f32,
    /// Time the target reaches the last node
    pub end_time: f32,
    /// Member receiving the position
    pub member: MemberPath,
    base: Option<PropertyValue>,
}

impl ObjectPathTrack {
    /// Create a path track
    pub fn new(
        name: impl Into<String>,
        spline: Spline,
        member: MemberPath,
        start_time: f32,
        end_time: f32,
    ) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            spline,
            start_time: start_time.max(0.0),
            end_time: end_time.max(start_time),
            member,
            base: None,
        }
    }

    /// Normalized progress at `time`, clamped before the start and after the end
    pub fn progress_at(&self, time: f32) -> f32 {
        let span = self.end_time - self.start_time;
        if span <= 0.0 {
            return if time >= self.start_time { 1.0 } else { 0.0 };
        }
        ((time - self.start_time) / span).clamp(0.0, 1.0)
    }

    /// Position at `time`
    pub fn position_at(&self, time: f32) -> [f32; 3] {
        self.spline.position_at(self.progress_at(time))
    }
}

impl Track for ObjectPathTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn track_type(&self) -> TrackType {
        TrackType::ObjectPath
    }

    fn start_timeline(&mut self, ctx: &TrackContext<'_>) {
        if let Some(target) = ctx.live_target() {
            if self.base.is_none() {
                self.base = target.get(&self.member);
            }
        }
    }

    fn process(&mut self, ctx: &TrackContext<'_>, sequence_time: f32, _playback_rate: f32) {
        let Some(target) = ctx.live_target() else {
            return;
        };
        let position = PropertyValue::Vec3(self.position_at(sequence_time));
        if let Err(e) = target.set(&self.member, position) {
            tracing::warn!("Path track '{}' could not move {}: {}", self.name, self.member, e);
        }
    }

    fn stop_timeline(&mut self, ctx: &TrackContext<'_>) {
        let base = self.base.take();
        if let (Some(target), Some(base)) = (ctx.live_target(), base) {
            restore(target, &self.member, base);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn restore(target: &TargetRef, member: &MemberPath, value: PropertyValue) {
    if let Err(e) = target.set(member, value) {
        tracing::warn!("Could not restore {}: {}", member, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{shared, PropertyBag};

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn test_spline_needs_two_nodes() {
        assert!(Spline::new(vec![[0.0; 3]]).is_err());
        assert!(Spline::new(vec![[0.0; 3], [1.0; 3]]).is_ok());
    }

    #[test]
    fn test_solver_by_node_count() {
        let two = Spline::new(vec![[0.0; 3]; 2]).unwrap();
        let three = Spline::new(vec![[0.0; 3]; 3]).unwrap();
        let five = Spline::new(vec![[0.0; 3]; 5]).unwrap();
        assert_eq!(two.solver(), SplineSolver::Linear);
        assert_eq!(three.solver(), SplineSolver::Quadratic);
        assert_eq!(five.solver(), SplineSolver::CatmullRom);
    }

    #[test]
    fn test_linear_midpoint() {
        let spline = Spline::new(vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]).unwrap();
        assert!(close(spline.position_at(0.5), [5.0, 0.0, 0.0]));
        assert!(close(spline.position_at(2.0), [10.0, 0.0, 0.0]));
    }

    #[test]
    fn test_quadratic_midpoint() {
        let spline = Spline::new(vec![[0.0, 0.0, 0.0], [1.0, 2.0, 0.0], [2.0, 0.0, 0.0]]).unwrap();
        assert!(close(spline.position_at(0.5), [1.0, 1.0, 0.0]));
    }

    #[test]
    fn test_catmull_rom_passes_through_nodes() {
        let nodes = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 0.0, 0.0], [3.0, 1.0, 0.0]];
        let spline = Spline::new(nodes.clone()).unwrap();
        assert!(close(spline.position_at(0.0), nodes[0]));
        assert!(close(spline.position_at(1.0 / 3.0), nodes[1]));
        assert!(close(spline.position_at(2.0 / 3.0), nodes[2]));
        assert!(close(spline.position_at(1.0), nodes[3]));
    }

    #[test]
    fn test_closed_path_returns_to_start() {
        let nodes = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let mut spline = Spline::new(nodes.clone()).unwrap();
        spline.close().unwrap();
        assert!(close(spline.position_at(1.0), nodes[0]));

        let mut short = Spline::new(vec![[0.0; 3]; 3]).unwrap();
        assert!(short.close().is_err());
    }

    #[test]
    fn test_sample_length_of_line() {
        let spline = Spline::new(vec![[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]]).unwrap();
        assert!((spline.sample_length(8) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_track_moves_and_restores() {
        let member = MemberPath::new("Transform", "position");
        let target = shared(
            PropertyBag::new("Car").with(member.clone(), PropertyValue::Vec3([9.0, 9.0, 9.0])),
        );
        let handle = TargetRef::new(&target);
        let spline = Spline::new(vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]).unwrap();
        let mut track = ObjectPathTrack::new("Drive", spline, member.clone(), 2.0, 4.0);

        let ctx = TrackContext {
            target: Some(&handle),
            running_time: 0.0,
            is_playing: true,
        };
        track.start_timeline(&ctx);
        track.process(&ctx, 1.0, 1.0);
        assert_eq!(target.borrow().get(&member), Some(PropertyValue::Vec3([0.0, 0.0, 0.0])));
        track.process(&ctx, 3.0, 1.0);
        assert_eq!(target.borrow().get(&member), Some(PropertyValue::Vec3([5.0, 0.0, 0.0])));
        track.process(&ctx, 8.0, 1.0);
        assert_eq!(target.borrow().get(&member), Some(PropertyValue::Vec3([10.0, 0.0, 0.0])));

        track.stop_timeline(&ctx);
        assert_eq!(target.borrow().get(&member), Some(PropertyValue::Vec3([9.0, 9.0, 9.0])));
    }
}
