//! Native inference backend for murmur.
//!
//! Provides [`InferenceBackend`] using [ONNX Runtime](https://onnxruntime.ai)
//! through the `ort` bindings. Faster than the interpreted backend and handles
//! dynamic shapes, but links a native library.
//!
//! ```rust,ignore
//! let synth = Synthesizer::builder()
//!     .backend(murmur_ort::ort_backend_factory())
//!     .build()?;
//! ```

mod session;

use murmur_core::{
    ensure_artifact_exists, BackendCapabilities, BackendFactory, BackendKind, InferenceBackend,
    InferenceConfig, LoadError, Session,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session as OrtSession;
use session::OrtGraph;
use std::path::Path;

/// ONNX Runtime inference backend.
pub struct OrtBackend {
    config: InferenceConfig,
}

impl OrtBackend {
    pub fn new(config: InferenceConfig) -> Result<Self, LoadError> {
        if config.intra_threads == Some(0) {
            return Err(LoadError::BackendInit(
                "intra_threads must be at least 1".into(),
            ));
        }
        Ok(Self { config })
    }

    fn optimization_level(&self) -> GraphOptimizationLevel {
        if self.config.optimize {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Disable
        }
    }
}

impl InferenceBackend for OrtBackend {
    fn load(&self, path: &Path) -> Result<Box<dyn Session>, LoadError> {
        ensure_artifact_exists(path)?;

        let init = |e: ort::Error| LoadError::BackendInit(e.to_string());

        let mut builder = OrtSession::builder()
            .map_err(init)?
            .with_optimization_level(self.optimization_level())
            .map_err(init)?;
        if let Some(threads) = self.config.intra_threads {
            builder = builder.with_intra_threads(threads).map_err(init)?;
        }

        let session = builder
            .commit_from_file(path)
            .map_err(|e| LoadError::Malformed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let graph = OrtGraph::new(session);
        tracing::debug!(
            path = %path.display(),
            inputs = ?graph.input_names(),
            outputs = ?graph.output_names(),
            "Loaded graph with ONNX Runtime"
        );
        Ok(Box::new(graph))
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "ONNX Runtime".into(),
            kind: BackendKind::Native,
            dynamic_shapes: true,
            graph_optimization: self.config.optimize,
        }
    }

    fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

/// Factory for the native backend.
pub fn ort_backend_factory() -> BackendFactory {
    Box::new(|config| Ok(Box::new(OrtBackend::new(config)?) as Box<dyn InferenceBackend>))
}
