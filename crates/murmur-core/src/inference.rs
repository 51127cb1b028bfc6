//! Inference backend abstraction: load a graph, run it with named tensors.
//!
//! Defines the [`InferenceBackend`] and [`Session`] traits that graph runtimes
//! (tract, ONNX Runtime) implement. All data crosses the boundary as
//! [`Tensor`](crate::Tensor) values addressed by name, so orchestration code
//! never depends on a particular runtime.

use crate::error::{InferenceError, LoadError};
use crate::tensor::TensorMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which graph runtime executes the exported models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pure-Rust interpreter. Portable, no native library, slower, weaker
    /// support for dynamic shapes.
    #[default]
    Interpreted,
    /// Native runtime behind a shared library. Faster, broader operator
    /// coverage, graph-level optimisation passes.
    Native,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interpreted => f.write_str("interpreted"),
            Self::Native => f.write_str("native"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: BackendKind,
    /// Run graph optimisation passes at load time.
    pub optimize: bool,
    /// Intra-op thread count for the native runtime. `None` lets it decide.
    pub intra_threads: Option<usize>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Interpreted,
            optimize: true,
            intra_threads: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// e.g. "tract", "ONNX Runtime"
    pub name: String,
    pub kind: BackendKind,
    pub dynamic_shapes: bool,
    pub graph_optimization: bool,
}

/// A loaded, runnable graph.
///
/// Sessions are not assumed to be safe for concurrent `run` calls; `run`
/// takes `&mut self` so sharing one requires exclusive access. Runtime
/// resources are released when the session is dropped.
pub trait Session: Send {
    /// Execute the graph once.
    ///
    /// Every declared input must be present in `inputs`; extra entries are
    /// ignored. Outputs are returned under their declared names.
    fn run(&mut self, inputs: &TensorMap) -> Result<TensorMap, InferenceError>;

    fn input_names(&self) -> &[String];

    fn output_names(&self) -> &[String];
}

/// Abstraction over graph runtimes.
///
/// # Lifecycle
///
/// 1. Create via a [`BackendFactory`]
/// 2. [`load`](Self::load) one [`Session`] per graph artifact
/// 3. Run sessions; drop them to release runtime resources
pub trait InferenceBackend: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn Session>, LoadError>;

    fn capabilities(&self) -> BackendCapabilities;

    fn config(&self) -> &InferenceConfig;
}

/// Factory function to create an [`InferenceBackend`].
pub type BackendFactory =
    Box<dyn FnOnce(InferenceConfig) -> Result<Box<dyn InferenceBackend>, LoadError> + Send>;

/// Check that every declared input is present before handing off to a runtime.
pub fn check_inputs(declared: &[String], inputs: &TensorMap) -> Result<(), InferenceError> {
    match declared.iter().find(|name| !inputs.contains(name)) {
        Some(name) => Err(InferenceError::MissingInput(name.clone())),
        None => Ok(()),
    }
}

/// Fail fast with [`LoadError::Missing`] instead of a runtime-specific message.
pub fn ensure_artifact_exists(path: &Path) -> Result<(), LoadError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(LoadError::Missing(path.to_path_buf()))
    }
}
