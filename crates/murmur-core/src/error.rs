//! Error types for murmur-core.

use crate::tensor::DType;
use std::path::PathBuf;
use thiserror::Error;

/// A graph artifact could not be turned into a runnable session.
///
/// Fatal: raised at startup, before any utterance is processed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Model artifact not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Malformed model artifact {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Model artifact {} is not supported by the {backend} backend: {reason}", path.display())]
    Unsupported {
        path: PathBuf,
        backend: String,
        reason: String,
    },

    #[error("Inference backend not available: {0}")]
    BackendUnavailable(String),

    #[error("Backend initialization failed: {0}")]
    BackendInit(String),
}

/// A session failed to execute.
///
/// Fatal for the current utterance. Inputs are deterministic, so a retry would
/// reproduce the same fault.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Missing input tensor '{0}'")]
    MissingInput(String),

    #[error("Missing output tensor '{0}'")]
    MissingOutput(String),

    #[error("Shape mismatch for '{name}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Element type mismatch: expected {expected}, found {found}")]
    DTypeMismatch { expected: DType, found: DType },

    #[error("Unsupported dynamic dimension: {0}")]
    DynamicDimension(String),

    #[error("Forward pass failed: {0}")]
    Runtime(String),
}

/// Caller-supplied dimensions disagree with what the consumer was configured for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Shape error in {context}: expected {expected}, found {found}")]
pub struct ShapeError {
    pub context: String,
    pub expected: String,
    pub found: String,
}

impl ShapeError {
    pub fn new(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}
