// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player errors.

use cutscene_sequencer::SequencerError;
use thiserror::Error;

/// Errors from loading and playing a sequence file
#[derive(Debug, Error)]
pub enum PlayerError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A RON file could not be parsed
    #[error("Failed to parse RON: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// A value could not be written as RON
    #[error("Failed to write RON: {0}")]
    RonWrite(#[from] ron::Error),

    /// The playback trace could not be written
    #[error("Failed to write trace: {0}")]
    Json(#[from] serde_json::Error),

    /// The sequencer rejected part of the document
    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),

    /// The document refers to something it does not define
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;
