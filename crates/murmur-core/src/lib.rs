//! Core types shared by every murmur crate.
//!
//! - [`Tensor`] / [`TensorMap`]: backend-neutral named tensors
//! - [`InferenceBackend`] / [`Session`]: the contract graph runtimes implement
//! - [`CancelToken`]: cooperative cancellation between decode steps
//! - [`LoadError`], [`InferenceError`], [`ShapeError`]: the error taxonomy
//!
//! No graph runtime is linked here. Concrete backends live in `murmur-tract`
//! (interpreted) and `murmur-ort` (native).

pub mod error;
pub use error::{InferenceError, LoadError, ShapeError};

pub mod tensor;
pub use tensor::{DType, Tensor, TensorData, TensorMap};

pub mod inference;
pub use inference::{
    check_inputs, ensure_artifact_exists, BackendCapabilities, BackendFactory, BackendKind,
    InferenceBackend, InferenceConfig, Session,
};

mod cancel;
pub use cancel::CancelToken;
