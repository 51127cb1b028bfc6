//! Error types for murmur-tacotron.

use murmur_core::{InferenceError, LoadError, ShapeError};
use std::time::Duration;
use thiserror::Error;

/// Error type for Tacotron2 orchestration.
///
/// Inference failures are tagged with the stage that raised them. Every
/// variant except `InvalidConfig` and `Load` fails one utterance only.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid decoder config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Encoding failed: {0}")]
    Encode(#[source] InferenceError),

    /// `step` is the zero-based index of the decoder step that failed.
    #[error("Decoding failed at step {step}: {source}")]
    Decode {
        step: usize,
        #[source]
        source: InferenceError,
    },

    #[error("Postnet failed: {0}")]
    Postnet(#[source] InferenceError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("Unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("Decoding cancelled before step {step}")]
    Cancelled { step: usize },

    #[error("Decoding exceeded its time budget after {step} steps ({elapsed:?})")]
    DeadlineExceeded { step: usize, elapsed: Duration },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
