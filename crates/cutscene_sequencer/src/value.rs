// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values that tracks can write to a target.

use serde::{Deserialize, Serialize};

/// Shape of an animatable value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Single float
    Float,
    /// Integer or enum discriminant, animated as a float and rounded
    Int,
    /// Boolean, animated as a float and thresholded at 0.5
    Bool,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// 4D vector
    Vec4,
    /// Rotation quaternion (x, y, z, w)
    Quat,
    /// Color (RGBA)
    Color,
}

impl ValueKind {
    /// Number of float channels (one curve each) this kind is animated with
    pub fn component_count(&self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Quat | Self::Color => 4,
        }
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float => "Float",
            Self::Int => "Int",
            Self::Bool => "Bool",
            Self::Vec2 => "Vec2",
            Self::Vec3 => "Vec3",
            Self::Vec4 => "Vec4",
            Self::Quat => "Quat",
            Self::Color => "Color",
        }
    }
}

/// A value read from or written to a target member
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Float value
    Float(f32),
    /// Integer / enum value
    Int(i32),
    /// Boolean
    Bool(bool),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// 4D vector
    Vec4([f32; 4]),
    /// Quaternion (x, y, z, w)
    Quat([f32; 4]),
    /// Color (RGBA)
    Color([f32; 4]),
}

impl PropertyValue {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Float(_) => ValueKind::Float,
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::Vec2(_) => ValueKind::Vec2,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Vec4(_) => ValueKind::Vec4,
            Self::Quat(_) => ValueKind::Quat,
            Self::Color(_) => ValueKind::Color,
        }
    }

    /// Split into float channels, one per curve
    pub fn components(&self) -> Vec<f32> {
        match *self {
            Self::Float(v) => vec![v],
            Self::Int(v) => vec![v as f32],
            Self::Bool(v) => vec![if v { 1.0 } else { 0.0 }],
            Self::Vec2(v) => v.to_vec(),
            Self::Vec3(v) => v.to_vec(),
            Self::Vec4(v) | Self::Quat(v) | Self::Color(v) => v.to_vec(),
        }
    }

    /// Rebuild a value of `kind` from evaluated channels.
    ///
    /// Missing channels read as zero. Quaternions are normalized.
    pub fn from_components(kind: ValueKind, channels: &[f32]) -> Self {
        let c = |i: usize| channels.get(i).copied().unwrap_or(0.0);
        match kind {
            ValueKind::Float => Self::Float(c(0)),
            ValueKind::Int => Self::Int(c(0).round() as i32),
            ValueKind::Bool => Self::Bool(c(0) >= 0.5),
            ValueKind::Vec2 => Self::Vec2([c(0), c(1)]),
            ValueKind::Vec3 => Self::Vec3([c(0), c(1), c(2)]),
            ValueKind::Vec4 => Self::Vec4([c(0), c(1), c(2), c(3)]),
            ValueKind::Quat => Self::Quat(normalize_quat([c(0), c(1), c(2), c(3)])),
            ValueKind::Color => Self::Color([c(0), c(1), c(2), c(3)]),
        }
    }

    /// Get as float if possible
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as Vec3 if possible
    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as bool if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Normalize a quaternion, leaving a zero quaternion as identity
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
    if len <= f32::EPSILON {
        return [0.0, 0.0, 0.0, 1.0];
    }
    [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
}
