//! Builder for configuring and constructing a `Synthesizer`.

use crate::config::SynthesisConfig;
use crate::{Result, Synthesizer};
use murmur_core::{BackendFactory, BackendKind, LoadError};
use murmur_tacotron::{SymbolTable, Tacotron2};
use murmur_vocoder::GriffinLim;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// The backend is picked from `inference_backend` unless a factory is given
/// explicitly. Configuration is validated before any artifact is touched.
///
/// # Example
///
/// ```ignore
/// use murmur::prelude::*;
///
/// let synth = Synthesizer::builder()
///     .config(SynthesisConfig::from_file("murmur.toml")?)
///     .build()?;
///
/// let out = synth.synthesize(&Symbol::parse_phones("HH AH0 L OW1")?)?;
/// out.waveform.write_wav("hello.wav")?;
/// ```
#[derive(Default)]
pub struct SynthesizerBuilder {
    config: SynthesisConfig,
    backend_factory: Option<BackendFactory>,
    symbol_table: Option<SymbolTable>,
}

impl SynthesizerBuilder {
    pub fn config(mut self, config: SynthesisConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML file.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = SynthesisConfig::from_file(path)?;
        Ok(self)
    }

    /// Shorthand for `[models] dir`.
    pub fn models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.models.dir = dir.into();
        self
    }

    /// Use a custom inference backend instead of the one named by
    /// `inference_backend`.
    pub fn backend(mut self, factory: BackendFactory) -> Self {
        self.backend_factory = Some(factory);
        self
    }

    /// Default: the NVIDIA Tacotron2 vocabulary.
    pub fn symbol_table(mut self, table: SymbolTable) -> Self {
        self.symbol_table = Some(table);
        self
    }

    pub fn build(self) -> Result<Synthesizer> {
        let config = self.config;
        config.validate()?;

        let factory = match self.backend_factory {
            Some(factory) => factory,
            None => backend_factory_for(config.inference_backend)?,
        };
        let backend = factory(config.inference_config())?;
        let capabilities = backend.capabilities();

        let started = Instant::now();
        let mut model = Tacotron2::load(
            backend.as_ref(),
            &config.models.paths(),
            config.decoder.clone(),
        )?;
        if let Some(table) = self.symbol_table {
            model = model.with_symbol_table(table);
        }
        let vocoder = GriffinLim::new(config.vocoder_config())?;

        tracing::info!(
            backend = %capabilities.name,
            postnet = model.has_postnet(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Synthesizer ready"
        );
        Ok(Synthesizer::from_parts(config, capabilities, model, vocoder))
    }
}

/// Factory for a compiled-in backend.
pub fn backend_factory_for(kind: BackendKind) -> Result<BackendFactory> {
    match kind {
        #[cfg(feature = "interpreted")]
        BackendKind::Interpreted => Ok(murmur_tract::tract_backend_factory()),
        #[cfg(feature = "native")]
        BackendKind::Native => Ok(murmur_ort::ort_backend_factory()),
        #[allow(unreachable_patterns)]
        other => Err(LoadError::BackendUnavailable(format!(
            "the {} backend was not compiled in; enable the `{}` feature",
            other, other
        ))
        .into()),
    }
}
