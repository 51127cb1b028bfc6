//! Interpreted inference backend for murmur.
//!
//! Provides [`InferenceBackend`] using [tract](https://github.com/sonos/tract),
//! a pure-Rust ONNX interpreter. No native library is needed, at the cost of
//! speed and weaker support for dynamic shapes.
//!
//! ```rust,ignore
//! let synth = Synthesizer::builder()
//!     .backend(murmur_tract::tract_backend_factory())
//!     .build()?;
//! ```

mod session;

use murmur_core::{
    ensure_artifact_exists, BackendCapabilities, BackendFactory, BackendKind, InferenceBackend,
    InferenceConfig, LoadError, Session,
};
use session::TractSession;
use std::path::Path;
use tract_onnx::prelude::{Framework, InferenceModelExt};

/// tract-based inference backend.
pub struct TractBackend {
    config: InferenceConfig,
}

impl TractBackend {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }
}

impl InferenceBackend for TractBackend {
    fn load(&self, path: &Path) -> Result<Box<dyn Session>, LoadError> {
        ensure_artifact_exists(path)?;

        let malformed = |e: tract_onnx::prelude::TractError| LoadError::Malformed {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        };
        let unsupported = |e: tract_onnx::prelude::TractError| LoadError::Unsupported {
            path: path.to_path_buf(),
            backend: "tract".into(),
            reason: format!("{:#}", e),
        };

        let model = tract_onnx::onnx().model_for_path(path).map_err(malformed)?;

        // Names are read before typing; optimisation may rename nodes but
        // keeps the input and output order.
        let inputs: Vec<String> = model
            .input_outlets()
            .map_err(malformed)?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();
        let outputs: Vec<String> = model
            .output_outlets()
            .map_err(malformed)?
            .iter()
            .map(|outlet| {
                model
                    .outlet_label(*outlet)
                    .map(str::to_string)
                    .unwrap_or_else(|| model.node(outlet.node).name.clone())
            })
            .collect();

        let typed = model.into_typed().map_err(unsupported)?;
        // Some exported recurrent graphs trip tract's optimiser; fall back to
        // the decluttered graph rather than refusing to load.
        let typed = if self.config.optimize {
            match typed.clone().into_optimized() {
                Ok(optimized) => optimized,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        "Graph optimisation failed, running decluttered graph: {:#}",
                        e
                    );
                    typed.into_decluttered().map_err(unsupported)?
                }
            }
        } else {
            typed.into_decluttered().map_err(unsupported)?
        };

        let input_shapes = (0..inputs.len())
            .map(|ix| {
                typed
                    .input_fact(ix)
                    .ok()
                    .and_then(|fact| fact.shape.as_concrete().map(|s| s.to_vec()))
            })
            .collect();

        let plan = typed.into_runnable().map_err(unsupported)?;

        tracing::debug!(
            path = %path.display(),
            inputs = ?inputs,
            outputs = ?outputs,
            "Loaded graph with tract"
        );

        Ok(Box::new(TractSession::new(
            plan,
            inputs,
            outputs,
            input_shapes,
        )))
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: "tract".into(),
            kind: BackendKind::Interpreted,
            dynamic_shapes: false,
            graph_optimization: self.config.optimize,
        }
    }

    fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

/// Factory for the interpreted backend.
pub fn tract_backend_factory() -> BackendFactory {
    Box::new(|config| Ok(Box::new(TractBackend::new(config)) as Box<dyn InferenceBackend>))
}
