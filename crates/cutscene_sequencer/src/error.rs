// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the sequencer core.

use crate::binding::MemberPath;
use crate::value::ValueKind;
use thiserror::Error;

/// Errors surfaced to callers of the sequencer API.
///
/// Only structural misuse ends up here. Per-item problems found while a tick
/// is running (missing targets, unresolved members) are logged and skipped.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// The property is already animated on this track
    #[error("Property {0} is already animated on this track")]
    DuplicateProperty(MemberPath),

    /// No keyframe with the given id exists in the curve
    #[error("Keyframe not found: {0}")]
    KeyframeNotFound(String),

    /// No track with the given id exists in the container
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// No container with the given id exists in the sequencer
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// No event with the given id exists on the track
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// A value of the wrong shape was written to a member
    #[error("Value kind mismatch for {path}: expected {expected:?}, got {got:?}")]
    ValueKindMismatch {
        /// Member that rejected the value
        path: MemberPath,
        /// Kind the member accepts
        expected: ValueKind,
        /// Kind that was supplied
        got: ValueKind,
    },

    /// The target has no member with this path
    #[error("Unknown member: {0}")]
    UnknownMember(MemberPath),

    /// The spline cannot be built from the given nodes
    #[error("Invalid spline: {0}")]
    InvalidSpline(String),
}

/// Result type for sequencer operations
pub type Result<T> = std::result::Result<T, SequencerError>;
