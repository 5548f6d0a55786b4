// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless host for cutscene sequences.
//!
//! Loads a RON sequence document, builds targets, cameras and tracks from
//! it, then drives the sequencer with fixed host ticks and records what
//! happened.

pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod player;

pub use config::PlayerConfig;
pub use document::{Scene, SceneTarget, SequenceDocument};
pub use driver::TracingDriver;
pub use error::{PlayerError, Result};
pub use player::{PlaybackSummary, Player, TraceEntry};
