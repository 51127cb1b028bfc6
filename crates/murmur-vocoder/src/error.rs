//! Error types for murmur-vocoder

use murmur_core::ShapeError;
use std::path::PathBuf;
use thiserror::Error;

/// Vocoder error type
#[derive(Error, Debug)]
pub enum VocoderError {
    /// Configuration rejected by [`VocoderConfig::validate`](crate::VocoderConfig::validate)
    #[error("Invalid vocoder config: {0}")]
    InvalidConfig(String),

    /// Spectrogram dimensions disagree with the configured transform
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// A mel filterbank file could not be read or has the wrong shape
    #[error("Failed to load mel filterbank {}: {reason}", path.display())]
    Filterbank { path: PathBuf, reason: String },

    /// The filterbank gram matrix is not positive definite
    #[error("Mel projection is singular: {0}")]
    SingularProjection(String),
}

/// Result type for vocoder operations
pub type Result<T> = std::result::Result<T, VocoderError>;
